// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Paygate payment-event ingestion pipeline.
//!
//! Multiple external payment providers (Stripe plus the Gumroad and Payhip
//! marketplaces) deliver asynchronous, at-least-once, unordered webhooks. This
//! crate verifies their authenticity, deduplicates deliveries through a
//! persistent ledger, normalizes the incompatible payload shapes into one
//! canonical event, and drives the domain side effects (grant or revoke
//! entitlement, send the onboarding email, issue a chat invite) exactly once
//! per real-world event.
//!
//! ## Components
//!
//! - **Signature verification** ([`signature`]): per-provider HMAC schemes
//!   over the raw body bytes, constant-time comparison
//! - **Event ledger** ([`ledger`]): atomic insert-if-absent dedup keyed by
//!   `(provider, event_id)`
//! - **Normalizer** ([`normalize`]): provider payloads -> [`PaymentEvent`]
//! - **Orchestrator** ([`orchestrator`]): side effects with partial-failure
//!   tolerance
//! - **Dispatcher** ([`notify`]): email and Telegram calls, failures captured
//!   as values

pub mod checkout;
pub mod config;
pub mod entitlements;
pub mod error;
pub mod event;
pub mod ledger;
pub mod normalize;
pub mod notify;
pub mod orchestrator;
pub mod signature;


pub use checkout::{CheckoutSession, CheckoutSessions};
pub use config::{EmailConfig, MarketplaceAuthMode, PipelineConfig, TelegramConfig};
pub use entitlements::{EntitlementService, EntitlementStatus};
pub use error::{PipelineError, PipelineResult};
pub use event::{EventKind, PaymentEvent, Provider};
pub use ledger::EventLedger;
pub use normalize::{normalize, GumroadPayload, PayhipPayload, ProviderPayload, StripeEvent};
pub use notify::{DispatchResult, NotificationDispatcher};
pub use orchestrator::{EntitlementOrchestrator, Outcome};

use sqlx::PgPool;

/// The assembled pipeline: ledger, orchestrator, and the read-only
/// entitlement surface, built once at startup from explicit configuration.
pub struct PipelineService {
    pub config: PipelineConfig,
    pub ledger: EventLedger,
    pub entitlements: EntitlementService,
    pub orchestrator: EntitlementOrchestrator,
}

impl PipelineService {
    pub fn new(config: PipelineConfig, pool: PgPool) -> Self {
        let dispatcher =
            NotificationDispatcher::new(config.email.clone(), config.telegram.clone());
        Self {
            ledger: EventLedger::new(pool.clone()),
            entitlements: EntitlementService::new(pool.clone()),
            orchestrator: EntitlementOrchestrator::new(pool, dispatcher),
            config,
        }
    }

    /// Run a verified, parsed payload through normalize -> ledger ->
    /// orchestrate.
    ///
    /// A ledger write failure does not fail the request: the delivery is
    /// processed as if new, trading a small duplicate-processing risk for
    /// webhook availability. Failing the acknowledgment would make the
    /// provider keep retrying and pile up.
    pub async fn ingest(&self, payload: &ProviderPayload) -> PipelineResult<Outcome> {
        let event = normalize(payload, &self.config.default_product_name)?;

        let newly_recorded = match self
            .ledger
            .record_if_new(event.provider, &event.event_id, event.kind.as_str())
            .await
        {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::error!(
                    provider = %event.provider,
                    event_id = %event.event_id,
                    error = %e,
                    "Ledger write failed, processing without dedup guarantee"
                );
                true
            }
        };

        Ok(self.orchestrator.process(&event, newly_recorded).await)
    }
}
