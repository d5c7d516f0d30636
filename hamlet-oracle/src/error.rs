//! Transport-level error types for the oracle providers.

use hamlet_core::oracle::OracleFailure;
use thiserror::Error;

/// Errors from the HTTP provider layer. These carry transport detail;
/// crossing into the engine they collapse to [`OracleFailure`].
#[derive(Debug, Error)]
pub enum OracleError {
    /// HTTP request failed.
    #[error("oracle request failed: {0}")]
    RequestFailed(String),

    /// Response body was not decodable.
    #[error("failed to parse oracle response: {0}")]
    Parse(String),

    /// Request timed out.
    #[error("oracle request timed out after {0}ms")]
    Timeout(u64),

    /// Provider returned HTTP 429.
    #[error("oracle rate limited")]
    RateLimited,

    /// Provider is unreachable or not configured.
    #[error("oracle provider unavailable: {0}")]
    Unavailable(String),

    /// All retry attempts exhausted.
    #[error("all oracle retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// The final attempt's error.
        last_error: String,
    },

    /// Configuration error.
    #[error("oracle configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout(0)
        } else if err.is_connect() {
            OracleError::Unavailable(err.to_string())
        } else {
            OracleError::RequestFailed(err.to_string())
        }
    }
}

impl From<OracleError> for OracleFailure {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout(ms) => OracleFailure::Timeout { elapsed_ms: ms },
            OracleError::RateLimited => OracleFailure::RateLimited,
            OracleError::Parse(reason) => OracleFailure::MalformedOutput(reason),
            OracleError::RetriesExhausted { attempts, last_error } => OracleFailure::Unavailable(
                format!("retries exhausted after {attempts} tries: {last_error}"),
            ),
            OracleError::RequestFailed(reason)
            | OracleError::Unavailable(reason)
            | OracleError::Config(reason) => OracleFailure::Unavailable(reason),
        }
    }
}
