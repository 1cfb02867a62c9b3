//! Payload normalization.
//!
//! Maps heterogeneous provider payloads into the canonical [`PaymentEvent`].
//! Field sets are finite and known, so each provider gets an explicit serde
//! model and a mapping function; there is no dynamic field lookup.
//!
//! Missing optional fields degrade to `None`. Normalization only errors when a
//! required identifying field is unrecoverably absent: the event id, or, for
//! sale events, both the sale id and the email.

use std::collections::HashMap;

use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{PipelineError, PipelineResult};
use crate::event::{EventKind, PaymentEvent, Provider};

/// Inbound payload, parsed but not yet normalized. One variant per provider.
#[derive(Debug)]
pub enum ProviderPayload {
    Stripe(StripeEvent),
    Gumroad(GumroadPayload),
    Payhip(PayhipPayload),
}

impl ProviderPayload {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderPayload::Stripe(_) => Provider::Stripe,
            ProviderPayload::Gumroad(_) => Provider::Gumroad,
            ProviderPayload::Payhip(_) => Provider::Payhip,
        }
    }

    /// Provider webhook-configuration UIs send connectivity test deliveries.
    /// These carry no real event identifier and are acknowledged
    /// unconditionally, bypassing auth, ledger, and normalization.
    pub fn is_ping(&self) -> bool {
        match self {
            ProviderPayload::Stripe(_) => false,
            ProviderPayload::Gumroad(p) => {
                p.event_name() == Some("ping") || p.test.as_deref() == Some("true")
            }
            ProviderPayload::Payhip(p) => {
                matches!(p.event_name(), Some("ping") | Some("test"))
            }
        }
    }

    /// Body-embedded shared secret, honored only when the marketplace auth
    /// mode allows it.
    pub fn body_secret(&self) -> Option<&str> {
        match self {
            ProviderPayload::Stripe(_) => None,
            ProviderPayload::Gumroad(p) => p.secret.as_deref(),
            ProviderPayload::Payhip(p) => p.secret.as_deref(),
        }
    }
}

/// Card-processor event envelope.
#[derive(Debug, Default, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub created: Option<i64>,
    #[serde(default)]
    pub data: StripeEventData,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeEventData {
    #[serde(default)]
    pub object: StripeObject,
}

/// The `data.object` of a card-processor event. Covers the checkout-session,
/// subscription, and charge shapes this pipeline reads; unknown fields are
/// dropped.
#[derive(Debug, Default, Deserialize)]
pub struct StripeObject {
    pub id: Option<String>,
    /// Shared by the checkout session and any later charge/refund/dispute on
    /// it; links revocations back to the entitlement the sale created.
    pub payment_intent: Option<StripePaymentIntentRef>,
    pub customer: Option<StripeCustomerRef>,
    pub customer_details: Option<StripeCustomerDetails>,
    pub customer_email: Option<String>,
    /// Charge-style events carry the payer email here.
    pub billing_details: Option<StripeBillingDetails>,
    pub receipt_email: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub items: Option<StripeItemList>,
}

/// Customer may arrive as a bare id or an expanded object depending on the
/// provider API version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StripeCustomerRef {
    Id(String),
    Object(StripeCustomerObject),
}

impl StripeCustomerRef {
    fn id(&self) -> Option<&str> {
        match self {
            StripeCustomerRef::Id(id) => Some(id),
            StripeCustomerRef::Object(c) => c.id.as_deref(),
        }
    }

    fn email(&self) -> Option<&str> {
        match self {
            StripeCustomerRef::Id(_) => None,
            StripeCustomerRef::Object(c) => c.email.as_deref(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeCustomerObject {
    pub id: Option<String>,
    pub email: Option<String>,
}

/// Payment intent arrives as a bare id or an expanded object, same as
/// `customer`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StripePaymentIntentRef {
    Id(String),
    Object(StripePaymentIntentObject),
}

impl StripePaymentIntentRef {
    fn id(&self) -> Option<&str> {
        match self {
            StripePaymentIntentRef::Id(id) => Some(id),
            StripePaymentIntentRef::Object(p) => p.id.as_deref(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StripePaymentIntentObject {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeBillingDetails {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeItemList {
    #[serde(default)]
    pub data: Vec<StripeItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeItem {
    pub price: Option<StripePrice>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripePrice {
    pub nickname: Option<String>,
}

/// Gumroad resource callback. Delivered as JSON or form-urlencoded, so every
/// field is a string.
#[derive(Debug, Default, Deserialize)]
pub struct GumroadPayload {
    pub resource_name: Option<String>,
    pub action: Option<String>,
    pub sale_id: Option<String>,
    pub id: Option<String>,
    pub order_number: Option<String>,
    pub purchaser_id: Option<String>,
    pub purchaser_email: Option<String>,
    pub email: Option<String>,
    pub customer: Option<NestedCustomer>,
    pub product_name: Option<String>,
    pub product_permalink: Option<String>,
    pub plan_id: Option<String>,
    pub sale_timestamp: Option<String>,
    pub test: Option<String>,
    pub secret: Option<String>,
}

impl GumroadPayload {
    fn event_name(&self) -> Option<&str> {
        self.resource_name.as_deref().or(self.action.as_deref())
    }
}

/// Payhip webhook payload.
#[derive(Debug, Default, Deserialize)]
pub struct PayhipPayload {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub action: Option<String>,
    pub transaction_id: Option<String>,
    pub id: Option<String>,
    pub buyer_email: Option<String>,
    pub email: Option<String>,
    pub customer: Option<NestedCustomer>,
    pub product_name: Option<String>,
    pub plan_id: Option<String>,
    pub secret: Option<String>,
}

impl PayhipPayload {
    fn event_name(&self) -> Option<&str> {
        self.event_type.as_deref().or(self.action.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NestedCustomer {
    pub email: Option<String>,
}

/// Map a parsed provider payload to the canonical event.
pub fn normalize(
    payload: &ProviderPayload,
    default_product_name: &str,
) -> PipelineResult<PaymentEvent> {
    match payload {
        ProviderPayload::Stripe(e) => normalize_stripe(e, default_product_name),
        ProviderPayload::Gumroad(p) => normalize_gumroad(p, default_product_name),
        ProviderPayload::Payhip(p) => normalize_payhip(p, default_product_name),
    }
}

fn normalize_stripe(event: &StripeEvent, default_product: &str) -> PipelineResult<PaymentEvent> {
    let event_id = event
        .id
        .clone()
        .ok_or_else(|| PipelineError::MalformedEvent("missing event id".to_string()))?;

    let kind = match event.event_type.as_deref() {
        Some("checkout.session.completed") => EventKind::SaleCompleted,
        Some("customer.subscription.created") => EventKind::SubscriptionActive,
        Some("charge.refunded") => EventKind::Refund,
        Some("charge.dispute.created") => EventKind::Chargeback,
        Some("customer.subscription.deleted") => EventKind::Cancellation,
        _ => EventKind::Ignored,
    };

    let object = &event.data.object;

    // API versions vary in where the payer email lives; first non-empty wins.
    let email = first_email(&[
        object.customer_details.as_ref().and_then(|d| d.email.as_deref()),
        object.customer_email.as_deref(),
        object.customer.as_ref().and_then(|c| c.email()),
        object.billing_details.as_ref().and_then(|b| b.email.as_deref()),
        object.receipt_email.as_deref(),
    ]);

    let price_nickname = object
        .items
        .as_ref()
        .and_then(|items| items.data.first())
        .and_then(|item| item.price.as_ref())
        .and_then(|price| price.nickname.clone());

    let product_name = object
        .metadata
        .get("product_name")
        .cloned()
        .or_else(|| price_nickname.clone())
        .unwrap_or_else(|| default_product.to_string());

    let plan_id = object.metadata.get("plan_id").cloned().or(price_nickname);

    // Refund and dispute events reference the charge, not the checkout
    // session. The payment intent is shared by both, so it wins as the
    // entitlement key whenever present.
    let checkout_ref = object
        .payment_intent
        .as_ref()
        .and_then(|p| p.id())
        .map(str::to_string)
        .or_else(|| object.id.clone());
    if kind.grants_access() && checkout_ref.is_none() && email.is_none() {
        return Err(PipelineError::MalformedEvent(
            "sale event without session id or email".to_string(),
        ));
    }

    Ok(PaymentEvent {
        event_id,
        provider: Provider::Stripe,
        kind,
        customer_ref: object
            .customer
            .as_ref()
            .and_then(|c| c.id())
            .map(str::to_string),
        checkout_ref,
        email,
        plan_id,
        product_name,
        occurred_at: event
            .created
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
            .unwrap_or_else(OffsetDateTime::now_utc),
    })
}

fn normalize_gumroad(payload: &GumroadPayload, default_product: &str) -> PipelineResult<PaymentEvent> {
    let kind = match payload.event_name() {
        Some("sale") => EventKind::SaleCompleted,
        Some("subscription_restarted") => EventKind::SubscriptionActive,
        Some("refund") => EventKind::Refund,
        Some("dispute") => EventKind::Chargeback,
        Some("cancellation") | Some("subscription_ended") => EventKind::Cancellation,
        _ => EventKind::Ignored,
    };

    let sale_id = payload
        .sale_id
        .clone()
        .or_else(|| payload.id.clone())
        .or_else(|| payload.order_number.clone());

    let email = first_email(&[
        payload.purchaser_email.as_deref(),
        payload.email.as_deref(),
        payload.customer.as_ref().and_then(|c| c.email.as_deref()),
    ]);

    let event_id = match sale_id {
        Some(id) => id,
        None => {
            return Err(PipelineError::MalformedEvent(
                "missing sale id".to_string(),
            ))
        }
    };
    if kind.grants_access() && email.is_none() && event_id.is_empty() {
        return Err(PipelineError::MalformedEvent(
            "sale event without sale id or email".to_string(),
        ));
    }

    Ok(PaymentEvent {
        event_id,
        provider: Provider::Gumroad,
        kind,
        customer_ref: payload.purchaser_id.clone(),
        // No checkout session on marketplace sales; the sale id substitutes
        // via PaymentEvent::access_key.
        checkout_ref: None,
        email,
        plan_id: payload
            .plan_id
            .clone()
            .or_else(|| payload.product_permalink.clone()),
        product_name: payload
            .product_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_product.to_string()),
        occurred_at: payload
            .sale_timestamp
            .as_deref()
            .and_then(|ts| OffsetDateTime::parse(ts, &Rfc3339).ok())
            .unwrap_or_else(OffsetDateTime::now_utc),
    })
}

fn normalize_payhip(payload: &PayhipPayload, default_product: &str) -> PipelineResult<PaymentEvent> {
    let kind = match payload.event_name() {
        Some("paid") => EventKind::SaleCompleted,
        Some("subscription.activated") => EventKind::SubscriptionActive,
        Some("refunded") => EventKind::Refund,
        Some("disputed") => EventKind::Chargeback,
        Some("subscription.cancelled") => EventKind::Cancellation,
        _ => EventKind::Ignored,
    };

    let email = first_email(&[
        payload.buyer_email.as_deref(),
        payload.email.as_deref(),
        payload.customer.as_ref().and_then(|c| c.email.as_deref()),
    ]);

    let event_id = payload
        .transaction_id
        .clone()
        .or_else(|| payload.id.clone())
        .ok_or_else(|| PipelineError::MalformedEvent("missing transaction id".to_string()))?;

    Ok(PaymentEvent {
        event_id,
        provider: Provider::Payhip,
        kind,
        customer_ref: None,
        checkout_ref: None,
        email,
        plan_id: payload.plan_id.clone(),
        product_name: payload
            .product_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_product.to_string()),
        occurred_at: OffsetDateTime::now_utc(),
    })
}

/// First non-empty candidate wins.
fn first_email(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|email| !email.is_empty())
        .map(|email| email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str = "Premium Access";

    fn stripe_event(json: &str) -> StripeEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn checkout_completed_round_trip() {
        let event = stripe_event(
            r#"{
                "id": "evt_1",
                "type": "checkout.session.completed",
                "created": 1700000000,
                "data": {"object": {
                    "id": "cs_test_1",
                    "customer": "cus_9",
                    "customer_details": {"email": "a@b.com"},
                    "metadata": {"plan_id": "premium_telegram"}
                }}
            }"#,
        );
        let normalized = normalize(&ProviderPayload::Stripe(event), DEFAULT).unwrap();
        assert_eq!(normalized.kind, EventKind::SaleCompleted);
        assert_eq!(normalized.email.as_deref(), Some("a@b.com"));
        assert_eq!(normalized.plan_id.as_deref(), Some("premium_telegram"));
        assert_eq!(normalized.checkout_ref.as_deref(), Some("cs_test_1"));
        assert_eq!(normalized.customer_ref.as_deref(), Some("cus_9"));
        assert_eq!(normalized.product_name, "Premium Access");
        assert_eq!(normalized.occurred_at.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn email_falls_back_to_customer_object() {
        let event = stripe_event(
            r#"{
                "id": "evt_2",
                "type": "checkout.session.completed",
                "data": {"object": {
                    "id": "cs_test_2",
                    "customer": {"id": "cus_2", "email": "c@d.com"}
                }}
            }"#,
        );
        let normalized = normalize(&ProviderPayload::Stripe(event), DEFAULT).unwrap();
        assert_eq!(normalized.email.as_deref(), Some("c@d.com"));
    }

    #[test]
    fn charge_email_falls_back_to_billing_details() {
        let event = stripe_event(
            r#"{
                "id": "evt_3",
                "type": "charge.refunded",
                "data": {"object": {
                    "id": "ch_1",
                    "billing_details": {"email": "payer@example.com"}
                }}
            }"#,
        );
        let normalized = normalize(&ProviderPayload::Stripe(event), DEFAULT).unwrap();
        assert_eq!(normalized.kind, EventKind::Refund);
        assert_eq!(normalized.email.as_deref(), Some("payer@example.com"));
    }

    #[test]
    fn refund_shares_access_key_with_its_checkout_session() {
        let sale = stripe_event(
            r#"{
                "id": "evt_sale",
                "type": "checkout.session.completed",
                "data": {"object": {
                    "id": "cs_9",
                    "payment_intent": "pi_9",
                    "customer_email": "a@b.com"
                }}
            }"#,
        );
        let refund = stripe_event(
            r#"{
                "id": "evt_refund",
                "type": "charge.refunded",
                "data": {"object": {"id": "ch_9", "payment_intent": "pi_9"}}
            }"#,
        );

        let sale = normalize(&ProviderPayload::Stripe(sale), DEFAULT).unwrap();
        let refund = normalize(&ProviderPayload::Stripe(refund), DEFAULT).unwrap();
        assert_eq!(sale.access_key(), "pi_9");
        assert_eq!(refund.kind, EventKind::Refund);
        assert_eq!(refund.access_key(), sale.access_key());
    }

    #[test]
    fn expanded_payment_intent_object_is_handled() {
        let event = stripe_event(
            r#"{
                "id": "evt_exp",
                "type": "charge.dispute.created",
                "data": {"object": {
                    "id": "dp_1",
                    "payment_intent": {"id": "pi_11"}
                }}
            }"#,
        );
        let normalized = normalize(&ProviderPayload::Stripe(event), DEFAULT).unwrap();
        assert_eq!(normalized.kind, EventKind::Chargeback);
        assert_eq!(normalized.access_key(), "pi_11");
    }

    #[test]
    fn unknown_stripe_type_is_ignored() {
        let event = stripe_event(
            r#"{"id": "evt_4", "type": "customer.updated", "data": {"object": {"id": "cus_4"}}}"#,
        );
        let normalized = normalize(&ProviderPayload::Stripe(event), DEFAULT).unwrap();
        assert_eq!(normalized.kind, EventKind::Ignored);
    }

    #[test]
    fn missing_event_id_is_malformed() {
        let event =
            stripe_event(r#"{"type": "checkout.session.completed", "data": {"object": {}}}"#);
        let result = normalize(&ProviderPayload::Stripe(event), DEFAULT);
        assert!(matches!(result, Err(PipelineError::MalformedEvent(_))));
    }

    #[test]
    fn plan_falls_back_to_price_nickname() {
        let event = stripe_event(
            r#"{
                "id": "evt_5",
                "type": "customer.subscription.created",
                "data": {"object": {
                    "id": "sub_1",
                    "customer": "cus_5",
                    "customer_email": "e@f.com",
                    "items": {"data": [{"price": {"nickname": "premium_monthly"}}]}
                }}
            }"#,
        );
        let normalized = normalize(&ProviderPayload::Stripe(event), DEFAULT).unwrap();
        assert_eq!(normalized.kind, EventKind::SubscriptionActive);
        assert_eq!(normalized.plan_id.as_deref(), Some("premium_monthly"));
        assert_eq!(normalized.product_name, "premium_monthly");
    }

    #[test]
    fn gumroad_sale_normalizes() {
        let payload: GumroadPayload = serde_urlencoded::from_str(
            "resource_name=sale&sale_id=S123&purchaser_email=buyer%40example.com&product_name=Report+Pack",
        )
        .unwrap();
        let normalized = normalize(&ProviderPayload::Gumroad(payload), DEFAULT).unwrap();
        assert_eq!(normalized.kind, EventKind::SaleCompleted);
        assert_eq!(normalized.event_id, "S123");
        assert_eq!(normalized.email.as_deref(), Some("buyer@example.com"));
        assert_eq!(normalized.product_name, "Report Pack");
        assert_eq!(normalized.access_key(), "S123");
    }

    #[test]
    fn gumroad_email_fallback_chain() {
        let payload = GumroadPayload {
            resource_name: Some("sale".to_string()),
            sale_id: Some("S124".to_string()),
            purchaser_email: None,
            email: Some("generic@example.com".to_string()),
            ..Default::default()
        };
        let normalized = normalize(&ProviderPayload::Gumroad(payload), DEFAULT).unwrap();
        assert_eq!(normalized.email.as_deref(), Some("generic@example.com"));
    }

    #[test]
    fn gumroad_refund_keeps_sale_key() {
        let payload = GumroadPayload {
            resource_name: Some("refund".to_string()),
            sale_id: Some("S123".to_string()),
            ..Default::default()
        };
        let normalized = normalize(&ProviderPayload::Gumroad(payload), DEFAULT).unwrap();
        assert_eq!(normalized.kind, EventKind::Refund);
        assert_eq!(normalized.access_key(), "S123");
    }

    #[test]
    fn gumroad_missing_sale_id_is_malformed() {
        let payload = GumroadPayload {
            resource_name: Some("sale".to_string()),
            email: Some("x@y.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            normalize(&ProviderPayload::Gumroad(payload), DEFAULT),
            Err(PipelineError::MalformedEvent(_))
        ));
    }

    #[test]
    fn gumroad_test_delivery_is_ping() {
        let payload = GumroadPayload {
            test: Some("true".to_string()),
            ..Default::default()
        };
        assert!(ProviderPayload::Gumroad(payload).is_ping());
    }

    #[test]
    fn payhip_paid_normalizes() {
        let payload: PayhipPayload = serde_json::from_str(
            r#"{"type": "paid", "transaction_id": "T55", "email": "p@q.com", "product_name": "Premium Channel"}"#,
        )
        .unwrap();
        let normalized = normalize(&ProviderPayload::Payhip(payload), DEFAULT).unwrap();
        assert_eq!(normalized.kind, EventKind::SaleCompleted);
        assert_eq!(normalized.event_id, "T55");
        assert_eq!(normalized.email.as_deref(), Some("p@q.com"));
    }

    #[test]
    fn payhip_unknown_type_is_ignored() {
        let payload = PayhipPayload {
            event_type: Some("product.updated".to_string()),
            transaction_id: Some("T56".to_string()),
            ..Default::default()
        };
        let normalized = normalize(&ProviderPayload::Payhip(payload), DEFAULT).unwrap();
        assert_eq!(normalized.kind, EventKind::Ignored);
    }

    #[test]
    fn empty_email_fields_are_skipped() {
        let payload = GumroadPayload {
            resource_name: Some("sale".to_string()),
            sale_id: Some("S200".to_string()),
            purchaser_email: Some(String::new()),
            email: Some("real@example.com".to_string()),
            ..Default::default()
        };
        let normalized = normalize(&ProviderPayload::Gumroad(payload), DEFAULT).unwrap();
        assert_eq!(normalized.email.as_deref(), Some("real@example.com"));
    }
}
