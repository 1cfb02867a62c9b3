#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Paygate API server.
//!
//! Hosts the provider webhook adapters and the entitlement status endpoint.

mod config;
mod error;
mod routes;
mod state;

use std::net::SocketAddr;

use paygate_pipeline::PipelineConfig;
use paygate_shared::{create_migration_pool, create_pool, run_migrations};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::routes::create_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,paygate_api=debug,paygate_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Paygate API server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let pipeline_config = PipelineConfig::from_env()?;
    tracing::info!("Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection established");

    if config.run_migrations {
        // Separate single-connection pool; DDL can hold locks longer than the
        // regular pool's acquire timeout allows.
        let migration_pool = create_migration_pool(&config.database_url).await?;
        run_migrations(&migration_pool).await?;
        migration_pool.close().await;
    } else {
        tracing::info!("Migrations skipped (RUN_MIGRATIONS not set)");
    }

    let state = AppState::new(pool, config.clone(), pipeline_config);

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
