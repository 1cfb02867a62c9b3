//! Idempotency ledger for webhook deliveries.
//!
//! Providers deliver at-least-once and retries can overlap the original
//! attempt, so dedup rests entirely on the database uniqueness constraint on
//! `(provider, event_id)`. In-process locking would not survive concurrent
//! instances and is not used.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PipelineResult;
use crate::event::Provider;

/// Persistent dedup store. Rows are never updated or deleted by the pipeline.
#[derive(Clone)]
pub struct EventLedger {
    pool: PgPool,
}

impl EventLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically record a delivery if it has not been seen before.
    ///
    /// Returns `true` for exactly one caller per `(provider, event_id)`, even
    /// under concurrent delivery of the same event; every other caller gets
    /// `false` and must skip side effects.
    pub async fn record_if_new(
        &self,
        provider: Provider,
        event_id: &str,
        event_type: &str,
    ) -> PipelineResult<bool> {
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO webhook_events (provider, event_id, event_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, event_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(provider.as_str())
        .bind(event_id)
        .bind(event_type)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_none() {
            tracing::info!(
                provider = %provider,
                event_id = %event_id,
                event_type = %event_type,
                "Duplicate webhook delivery, skipping side effects"
            );
        }

        Ok(inserted.is_some())
    }
}
