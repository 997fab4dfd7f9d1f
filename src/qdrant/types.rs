//! Types shared across the Qdrant integration.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failures raised by search-index operations.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// The configured base URL could not be parsed.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// The request never produced a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant answered with a status the operation cannot handle.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// Status code of the failing response.
        status: StatusCode,
        /// Response body, drained for diagnostics.
        body: String,
    },
}

/// Outcome of one batch upsert.
///
/// The REST upsert applies a batch atomically, so a successful call reports
/// every record as succeeded; stub implementations used in tests may report
/// partial failures to exercise the unmarked-tracker path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertReport {
    /// Number of records accepted by the index.
    pub succeeded: usize,
    /// Number of records the index rejected.
    pub failed: usize,
}

#[derive(Deserialize)]
pub(crate) struct CountResponse {
    pub(crate) result: CountResult,
}

#[derive(Deserialize)]
pub(crate) struct CountResult {
    pub(crate) count: usize,
}
