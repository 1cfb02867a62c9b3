//! HTTP error mapping.
//!
//! Only three conditions produce a non-2xx response: wrong method (axum's
//! built-in 405), invalid or missing signature, and an unparseable body when
//! the declared content type required parsing. Everything else degrades to a
//! 200 acknowledgment with a diagnostic field so the provider stops retrying.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use paygate_pipeline::PipelineError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing signature")]
    MissingSignature,
    #[error("bad signature")]
    BadSignature,
    #[error("invalid body")]
    InvalidBody,
    #[error("internal error")]
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::SignatureMissing => ApiError::MissingSignature,
            PipelineError::SignatureInvalid => ApiError::BadSignature,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MissingSignature => (StatusCode::BAD_REQUEST, "missing signature"),
            ApiError::BadSignature => (StatusCode::BAD_REQUEST, "bad signature"),
            ApiError::InvalidBody => (StatusCode::BAD_REQUEST, "invalid body"),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        };

        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}
