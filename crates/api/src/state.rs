//! Application state.

use std::sync::Arc;

use paygate_pipeline::{PipelineConfig, PipelineService};
use sqlx::PgPool;

use crate::config::Config;

/// Shared application state. Cloned per request; no request-level mutation.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub pipeline: Arc<PipelineService>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, pipeline_config: PipelineConfig) -> Self {
        if pipeline_config.stripe_webhook_secret.is_none() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set - Stripe webhooks will be rejected");
        }
        if pipeline_config.gumroad_secret.is_none() {
            tracing::warn!("GUMROAD_WEBHOOK_SECRET not set - Gumroad webhooks will be rejected");
        }
        if pipeline_config.payhip_secret.is_none() {
            tracing::warn!("PAYHIP_WEBHOOK_SECRET not set - Payhip webhooks will be rejected");
        }
        if pipeline_config.email.api_key.is_none() {
            tracing::warn!("RESEND_API_KEY not set - access emails will fail");
        }

        let pipeline = Arc::new(PipelineService::new(pipeline_config, pool.clone()));
        Self {
            pool,
            config,
            pipeline,
        }
    }
}
