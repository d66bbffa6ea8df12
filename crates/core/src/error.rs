//! Unified error types for bookscout.
//!
//! Every variant carries a stable code prefix in its `Display` output. Use
//! [`Error::sanitized_message`] for anything shown to an end user.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the discovery layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed user input. Never reaches the retry logic.
    #[error("VALIDATION_ERROR: {0}")]
    Validation(String),

    /// Retryable provider failure (timeout, network, 429, 5xx).
    #[error("TRANSIENT_ERROR: {0}")]
    Transient(String),

    /// Non-retryable provider failure (bad credentials, malformed request).
    #[error("PERMANENT_ERROR: {0}")]
    Permanent(String),

    /// Cache backing store failed. Callers degrade to a cache miss.
    #[error("CACHE_UNAVAILABLE: {0}")]
    CacheUnavailable(String),

    /// Retry policy exhausted (or the request deadline left no room for another attempt).
    #[error("RETRIES_EXHAUSTED: gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// Request rejected by a process-wide rate limiter before dispatch.
    #[error("RATE_LIMITED: {0}")]
    RateLimited(String),

    /// AI completion capability failed. Absorbed by the search-intelligence stage.
    #[error("AI_UNAVAILABLE: {0}")]
    AiUnavailable(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Cached payload could not be encoded or decoded.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    /// Message safe to show to a caller. Upstream and storage details are dropped.
    pub fn sanitized_message(&self) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::RateLimited(_) => "Too many searches right now, please wait a moment and try again".into(),
            Error::Permanent(_) => "The book provider rejected this search".into(),
            Error::Transient(_) | Error::RetriesExhausted { .. } => {
                "The book provider is temporarily unavailable, please try again later".into()
            }
            Error::AiUnavailable(_) => "Search suggestions are currently unavailable".into(),
            Error::CacheUnavailable(_)
            | Error::Database(_)
            | Error::MigrationFailed(_)
            | Error::Serialization(_) => "Result cache is unavailable".into(),
        }
    }

    /// Whether the failure ends the request (as opposed to degrading it).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::CacheUnavailable(_) | Error::AiUnavailable(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::Validation(_) => -32602,
            Error::CacheUnavailable(_) => -32001,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Serialization(_) => -32002,
            Error::Transient(_) => -32003,
            Error::Permanent(_) => -32004,
            Error::RetriesExhausted { .. } => -32005,
            Error::RateLimited(_) => -32006,
            Error::AiUnavailable(_) => -32007,
        };

        McpError { code: ErrorCode(code), message: err.sanitized_message().into(), data: None }
    }
}
