//! Canonical payment event model.
//!
//! Every provider payload is normalized into a [`PaymentEvent`] before the
//! orchestrator sees it. `(provider, event_id)` uniquely identifies a delivery
//! attempt; the same real-world event may arrive multiple times with the same
//! pair and must be processed at most once.

use serde::Serialize;
use time::OffsetDateTime;

/// Payment providers that deliver webhooks to this pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    Gumroad,
    Payhip,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Gumroad => "gumroad",
            Provider::Payhip => "payhip",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical event classification. Only a fixed allow-list of provider event
/// types maps to a domain kind; everything else is `Ignored` and acknowledged
/// without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SaleCompleted,
    SubscriptionActive,
    Refund,
    Chargeback,
    Cancellation,
    Ignored,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SaleCompleted => "sale_completed",
            EventKind::SubscriptionActive => "subscription_active",
            EventKind::Refund => "refund",
            EventKind::Chargeback => "chargeback",
            EventKind::Cancellation => "cancellation",
            EventKind::Ignored => "ignored",
        }
    }

    /// Kinds that grant access.
    pub fn grants_access(&self) -> bool {
        matches!(self, EventKind::SaleCompleted | EventKind::SubscriptionActive)
    }

    /// Kinds that revoke access.
    pub fn revokes_access(&self) -> bool {
        matches!(
            self,
            EventKind::Refund | EventKind::Chargeback | EventKind::Cancellation
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-agnostic payment event produced by the normalizer.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
    /// Provider-scoped event identifier; globally unique when paired with
    /// `provider`.
    pub event_id: String,
    pub provider: Provider,
    pub kind: EventKind,
    /// Provider's customer or purchaser identifier, when present.
    pub customer_ref: Option<String>,
    /// Payment reference used as the entitlement key: the card processor's
    /// payment intent when present (shared by the checkout session and later
    /// charge events), else the checkout-session or order id. Marketplace
    /// sales may carry neither; the sale id (== `event_id`) substitutes.
    pub checkout_ref: Option<String>,
    pub email: Option<String>,
    pub plan_id: Option<String>,
    pub product_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

impl PaymentEvent {
    /// Conflict key for the entitlement upsert: the checkout ref when the
    /// provider supplied one, else the sale id. Revocations locate the
    /// entitlement by the same key.
    pub fn access_key(&self) -> &str {
        self.checkout_ref.as_deref().unwrap_or(&self.event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification() {
        assert!(EventKind::SaleCompleted.grants_access());
        assert!(EventKind::SubscriptionActive.grants_access());
        assert!(EventKind::Refund.revokes_access());
        assert!(EventKind::Chargeback.revokes_access());
        assert!(EventKind::Cancellation.revokes_access());
        assert!(!EventKind::Ignored.grants_access());
        assert!(!EventKind::Ignored.revokes_access());
    }

    #[test]
    fn access_key_falls_back_to_event_id() {
        let event = PaymentEvent {
            event_id: "sale_123".to_string(),
            provider: Provider::Gumroad,
            kind: EventKind::SaleCompleted,
            customer_ref: None,
            checkout_ref: None,
            email: Some("buyer@example.com".to_string()),
            plan_id: None,
            product_name: "Premium Access".to_string(),
            occurred_at: OffsetDateTime::now_utc(),
        };
        assert_eq!(event.access_key(), "sale_123");
    }
}
