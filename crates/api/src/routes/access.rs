//! Entitlement status endpoint.
//!
//! Read-only surface over the pipeline's written state; used by the
//! storefront's "am I premium?" check.

use axum::extract::{Query, State};
use axum::Json;
use paygate_pipeline::EntitlementStatus;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub email: String,
}

pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<EntitlementStatus>, ApiError> {
    let status = state
        .pipeline
        .entitlements
        .lookup(&query.email)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(status))
}
