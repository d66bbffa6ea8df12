//! OpenAI client error types.

use std::sync::Arc;

use bookscout_core::UpstreamError;

/// Errors from the chat completions API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpenAiError {
    /// No API key configured.
    #[error("missing API key: BOOKSCOUT_OPENAI_API_KEY not set")]
    MissingApiKey,

    /// API key rejected.
    #[error("authentication failed: HTTP {status}")]
    Auth { status: u16 },

    /// Rate or quota limit hit.
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

    /// Response body or model reply could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The model returned no content.
    #[error("empty completion")]
    EmptyReply,
}

impl From<reqwest::Error> for OpenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { OpenAiError::Timeout } else { OpenAiError::Network(Arc::new(err)) }
    }
}

impl From<OpenAiError> for UpstreamError {
    fn from(err: OpenAiError) -> Self {
        match err {
            OpenAiError::MissingApiKey => UpstreamError::Auth { status: 401 },
            OpenAiError::Auth { status } => UpstreamError::Auth { status },
            OpenAiError::RateLimited => UpstreamError::RateLimited,
            OpenAiError::Http { status } => UpstreamError::from_status(status),
            OpenAiError::Timeout => UpstreamError::Timeout,
            OpenAiError::Network(e) => UpstreamError::Network(e.to_string()),
            OpenAiError::Parse(msg) => UpstreamError::InvalidResponse(msg),
            OpenAiError::EmptyReply => UpstreamError::InvalidResponse("empty completion".into()),
        }
    }
}
