//! HTTP routes.

pub mod access;
pub mod webhooks;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route(
            "/webhooks/stripe",
            post(webhooks::stripe).get(webhooks::stripe_health),
        )
        .route("/webhooks/gumroad", post(webhooks::gumroad))
        .route("/webhooks/payhip", post(webhooks::payhip))
        .route("/access/status", get(access::status))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
