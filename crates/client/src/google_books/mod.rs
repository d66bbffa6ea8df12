//! Google Books API client.
//!
//! Implements [`MetadataProvider`] over the public volumes search endpoint.
//!
//! ### API
//!
//! - **Endpoint**: `https://www.googleapis.com/books/v1/volumes`
//! - **Authentication**: optional `key` query parameter.
//! - **Status mapping**: 429 and 5xx are transient, 401/403 and other 4xx
//!   permanent. Retrying is left to the caller's `RetryExecutor`.
//! - **Normalization**: volumes become [`Book`]s with an https cover at
//!   `zoom=2`; volumes without a cover are dropped.

pub mod error;
pub mod request;
pub mod response;

pub use error::GoogleBooksError;
pub use request::{MAX_RESULTS_PER_PAGE, VolumesRequest};
pub use response::{ImageLinks, Volume, VolumeInfo, VolumesResponse};

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bookscout_core::{AppConfig, Book, MetadataProvider, UpstreamError};
use reqwest::header;

/// Default base URL for the Books API.
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_USER_AGENT: &str = "bookscout/0.1";

/// Google Books client configuration.
#[derive(Debug, Clone)]
pub struct GoogleBooksConfig {
    /// Optional API key (BOOKSCOUT_GOOGLE_BOOKS_API_KEY).
    pub api_key: Option<String>,
    /// Base URL (default: https://www.googleapis.com/books/v1).
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Two-letter language restriction; empty disables it.
    pub language: String,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            language: "en".to_string(),
        }
    }
}

impl From<&AppConfig> for GoogleBooksConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_key: config.google_books_api_key.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            language: config.language.clone(),
            ..Default::default()
        }
    }
}

/// Google Books volumes client.
#[derive(Debug, Clone)]
pub struct GoogleBooksClient {
    http: reqwest::Client,
    config: GoogleBooksConfig,
}

impl GoogleBooksClient {
    pub fn new(config: GoogleBooksConfig) -> Result<Self, GoogleBooksError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GoogleBooksError::Network(Arc::new(e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GoogleBooksConfig {
        &self.config
    }

    /// Build the request sent for `query` and `limit`.
    pub fn volumes_request(&self, query: &str, limit: u32) -> VolumesRequest {
        VolumesRequest::new(query, limit)
            .with_language(Some(self.config.language.as_str()))
            .with_key(self.config.api_key.as_deref())
    }

    /// Run one volumes search.
    pub async fn search_volumes(&self, req: &VolumesRequest) -> Result<VolumesResponse, GoogleBooksError> {
        req.validate()?;

        let start = Instant::now();
        let url = format!("{}/volumes", self.config.base_url);

        tracing::debug!(query = %req.q, max_results = ?req.max_results, "searching Google Books");

        let http_response = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .query(req)
            .send()
            .await?;

        let status = http_response.status();
        tracing::debug!(%status, "Google Books response status");

        if status == 401 || status == 403 {
            return Err(GoogleBooksError::Auth { status: status.as_u16() });
        }

        if status == 429 {
            return Err(GoogleBooksError::RateLimited);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(GoogleBooksError::Http { status: status.as_u16() });
        }

        let bytes = http_response.bytes().await?;
        let response: VolumesResponse =
            serde_json::from_slice(&bytes).map_err(|e| GoogleBooksError::Parse(e.to_string()))?;

        tracing::debug!(elapsed = ?start.elapsed(), items = response.items.len(), "Google Books search completed");

        Ok(response)
    }
}

#[async_trait]
impl MetadataProvider for GoogleBooksClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Book>, UpstreamError> {
        let req = self.volumes_request(query, limit);
        let response = self.search_volumes(&req).await?;
        Ok(response.into_books())
    }
}
