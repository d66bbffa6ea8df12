//! Google Books client error types.

use std::sync::Arc;

use bookscout_core::UpstreamError;

/// Errors from the Google Books volumes API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GoogleBooksError {
    /// Request parameters rejected before sending.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// API key rejected.
    #[error("authentication failed: HTTP {status}")]
    Auth { status: u16 },

    /// Quota or per-user rate limit hit.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GoogleBooksError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { GoogleBooksError::Timeout } else { GoogleBooksError::Network(Arc::new(err)) }
    }
}

impl From<GoogleBooksError> for UpstreamError {
    fn from(err: GoogleBooksError) -> Self {
        match err {
            GoogleBooksError::InvalidRequest(_) => UpstreamError::Rejected { status: 400 },
            GoogleBooksError::Auth { status } => UpstreamError::Auth { status },
            GoogleBooksError::RateLimited => UpstreamError::RateLimited,
            GoogleBooksError::Http { status } => UpstreamError::from_status(status),
            GoogleBooksError::Timeout => UpstreamError::Timeout,
            GoogleBooksError::Network(e) => UpstreamError::Network(e.to_string()),
            GoogleBooksError::Parse(msg) => UpstreamError::InvalidResponse(msg),
        }
    }
}
