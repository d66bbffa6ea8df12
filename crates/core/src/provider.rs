//! Narrow interfaces to the two external services.
//!
//! The HTTP implementations live in `bookscout-client`; the facade only sees
//! these traits, which keeps it testable with in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::model::Book;
use crate::retry::{ErrorClass, RetryError};

/// Failure reported by an upstream HTTP service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    /// HTTP 429.
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// HTTP 5xx.
    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    /// HTTP 401/403.
    #[error("authentication failed: HTTP {status}")]
    Auth { status: u16 },

    /// HTTP 4xx other than auth and rate limiting.
    #[error("request rejected: HTTP {status}")]
    Rejected { status: u16 },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => UpstreamError::RateLimited,
            401 | 403 => UpstreamError::Auth { status },
            500..=599 => UpstreamError::Server { status },
            408 => UpstreamError::Timeout,
            _ => UpstreamError::Rejected { status },
        }
    }

    /// Standard retry classification: throttling, timeouts, network faults and
    /// 5xx are transient; everything else is permanent.
    pub fn class(&self) -> ErrorClass {
        match self {
            UpstreamError::RateLimited
            | UpstreamError::Timeout
            | UpstreamError::Network(_)
            | UpstreamError::Server { .. } => ErrorClass::Transient,
            UpstreamError::Auth { .. } | UpstreamError::Rejected { .. } | UpstreamError::InvalidResponse(_) => {
                ErrorClass::Permanent
            }
        }
    }
}

impl From<RetryError<UpstreamError>> for Error {
    fn from(err: RetryError<UpstreamError>) -> Self {
        match err {
            RetryError::Permanent(e) => Error::Permanent(e.to_string()),
            RetryError::Exhausted { attempts, last } => Error::RetriesExhausted { attempts, last: last.to_string() },
        }
    }
}

/// Book metadata search (Google Books in production).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Book>, UpstreamError>;
}

/// A corrected query with the model's own confidence in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub suggestion: String,
    pub confidence: f64,
}

/// AI completion capability used by the search-intelligence stage.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Propose a typo-corrected version of `query`.
    async fn correct(&self, query: &str) -> Result<Completion, UpstreamError>;

    /// Propose up to `count` related queries for a search that found nothing.
    async fn suggest_alternatives(&self, query: &str, count: usize) -> Result<Vec<String>, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(UpstreamError::from_status(429).class(), ErrorClass::Transient);
        assert_eq!(UpstreamError::from_status(500).class(), ErrorClass::Transient);
        assert_eq!(UpstreamError::from_status(503).class(), ErrorClass::Transient);
        assert_eq!(UpstreamError::from_status(408).class(), ErrorClass::Transient);
        assert_eq!(UpstreamError::from_status(400).class(), ErrorClass::Permanent);
        assert_eq!(UpstreamError::from_status(401).class(), ErrorClass::Permanent);
        assert_eq!(UpstreamError::from_status(404).class(), ErrorClass::Permanent);
        assert_eq!(UpstreamError::Network("reset".into()).class(), ErrorClass::Transient);
        assert_eq!(UpstreamError::InvalidResponse("eof".into()).class(), ErrorClass::Permanent);
    }

    #[test]
    fn test_retry_error_conversion() {
        let err: Error = RetryError::Exhausted { attempts: 3, last: UpstreamError::Timeout }.into();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));

        let err: Error = RetryError::Permanent(UpstreamError::Auth { status: 401 }).into();
        assert!(matches!(err, Error::Permanent(_)));
    }
}
