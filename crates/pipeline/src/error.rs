//! Pipeline error taxonomy.
//!
//! Only signature failures and malformed bodies ever surface as non-2xx HTTP
//! responses. Ledger, persistence, and notification failures are degraded to
//! logged diagnostics by the orchestrator, because provider retry storms are
//! worse than a best-effort miss.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No signature header was supplied for a provider that requires one.
    #[error("missing signature")]
    SignatureMissing,

    /// A signature header was supplied but did not verify against the raw body.
    #[error("bad signature")]
    SignatureInvalid,

    /// A required identifying field was unrecoverably absent after
    /// normalization. Acknowledged with 200 + `skipped` at the HTTP layer;
    /// retrying will not fix a malformed payload.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Database(e.to_string())
    }
}
