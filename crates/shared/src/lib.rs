//! Shared infrastructure for the paygate workspace.
//!
//! Database pool construction and migration helpers used by the API binary
//! and the pipeline crate.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create the main connection pool.
///
/// Sized for short-lived webhook request handling: each request performs at
/// most a handful of sequential queries, so a small pool is plenty.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
}

/// Create a pool for running migrations.
///
/// Uses a single connection with a longer acquire timeout; migration DDL can
/// hold locks longer than regular queries.
pub async fn create_migration_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(60))
        .connect(database_url)
        .await
}

/// Run the workspace migrations against the given pool.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
