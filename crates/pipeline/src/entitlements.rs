//! Customer and entitlement persistence.
//!
//! The pipeline exclusively owns the `customers` and `entitlements` tables.
//! Entitlements are keyed by the payment ref (card processor) or the sale id
//! (marketplace providers); status only ever moves active -> revoked here.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

/// Read-model for the status-check endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementStatus {
    pub is_premium: bool,
    pub member: bool,
}

#[derive(Clone)]
pub struct EntitlementService {
    pool: PgPool,
}

impl EntitlementService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a payer identity, keyed by the provider customer id when
    /// present, else by email.
    pub async fn upsert_customer(
        &self,
        provider_customer_id: Option<&str>,
        email: Option<&str>,
    ) -> PipelineResult<Uuid> {
        if let Some(pcid) = provider_customer_id {
            let (id,): (Uuid,) = sqlx::query_as(
                r#"
                INSERT INTO customers (provider_customer_id, email)
                VALUES ($1, $2)
                ON CONFLICT (provider_customer_id) DO UPDATE SET
                    email = COALESCE(EXCLUDED.email, customers.email)
                RETURNING id
                "#,
            )
            .bind(pcid)
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
            return Ok(id);
        }

        let email = email.ok_or_else(|| {
            PipelineError::MalformedEvent("customer identity missing".to_string())
        })?;

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO customers (email)
            VALUES ($1)
            ON CONFLICT (email) WHERE provider_customer_id IS NULL
            DO UPDATE SET email = EXCLUDED.email
            RETURNING id
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Grant access for the given key. Re-delivery of a later sale event for
    /// the same key refreshes `last_event_at` but never resurrects a revoked
    /// entitlement.
    pub async fn activate(
        &self,
        customer_id: Option<Uuid>,
        access_key: &str,
        plan_id: Option<&str>,
        occurred_at: OffsetDateTime,
    ) -> PipelineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO entitlements (customer_id, access_key, status, plan_id, last_event_at)
            VALUES ($1, $2, 'active', $3, $4)
            ON CONFLICT (access_key) DO UPDATE SET
                customer_id = COALESCE(EXCLUDED.customer_id, entitlements.customer_id),
                plan_id = COALESCE(EXCLUDED.plan_id, entitlements.plan_id),
                status = CASE
                    WHEN entitlements.status = 'revoked' THEN 'revoked'
                    ELSE 'active'
                END,
                last_event_at = EXCLUDED.last_event_at
            "#,
        )
        .bind(customer_id)
        .bind(access_key)
        .bind(plan_id)
        .bind(occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Revoke access for the given key. Unknown keys are a no-op; returns
    /// whether an entitlement row was touched.
    pub async fn revoke(
        &self,
        access_key: &str,
        occurred_at: OffsetDateTime,
    ) -> PipelineResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE entitlements
            SET status = 'revoked', last_event_at = $2
            WHERE access_key = $1
            "#,
        )
        .bind(access_key)
        .bind(occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Read-only status surface consumed by the access-status endpoint.
    pub async fn lookup(&self, email: &str) -> PipelineResult<EntitlementStatus> {
        let (member, is_premium): (bool, bool) = sqlx::query_as(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM customers WHERE email = $1),
                EXISTS (
                    SELECT 1 FROM entitlements e
                    JOIN customers c ON c.id = e.customer_id
                    WHERE c.email = $1 AND e.status = 'active'
                )
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(EntitlementStatus { is_premium, member })
    }
}
