//! OpenAI chat completions client.
//!
//! Implements [`CompletionService`] for query correction and alternative
//! suggestions.
//!
//! ### API
//!
//! - **Endpoint**: `POST https://api.openai.com/v1/chat/completions`
//! - **Authentication**: bearer token.
//! - **Budgets**: corrections use the short token budget at the precise
//!   temperature and ask for a JSON reply; alternatives use the medium
//!   budget at the creative temperature, one suggestion per line.

pub mod error;
pub mod request;
pub mod response;

pub use error::OpenAiError;
pub use request::{ChatMessage, ChatRequest};
pub use response::{ChatResponse, parse_alternatives, parse_correction};

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bookscout_core::config::AiSettings;
use bookscout_core::{AppConfig, Completion, CompletionService, ConfigError, UpstreamError};
use reqwest::header;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI client configuration.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Base URL (default: https://api.openai.com/v1).
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub ai: AiSettings,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("ai", &self.ai)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: "bookscout/0.1".to_string(),
            ai: AiSettings::default(),
        }
    }

    /// Build from application config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when no OpenAI key is configured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_openai_api_key()?;
        Ok(Self {
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            ai: config.ai.clone(),
            ..Self::new(api_key)
        })
    }
}

/// OpenAI chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: Arc<OpenAiConfig>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, OpenAiError> {
        if config.api_key.is_empty() {
            return Err(OpenAiError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| OpenAiError::Network(Arc::new(e)))?;

        Ok(Self { http, config: Arc::new(config) })
    }

    pub fn correction_request(&self, query: &str) -> ChatRequest {
        let ai = &self.config.ai;
        ChatRequest::new(&ai.model, request::correction_messages(query), ai.max_tokens_short, ai.temperature_precise)
            .json_reply()
    }

    pub fn alternatives_request(&self, query: &str, count: usize) -> ChatRequest {
        let ai = &self.config.ai;
        ChatRequest::new(
            &ai.model,
            request::alternatives_messages(query, count),
            ai.max_tokens_medium,
            ai.temperature_creative,
        )
    }

    /// Send one chat completion and return the reply text.
    pub async fn complete(&self, req: &ChatRequest) -> Result<String, OpenAiError> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.config.base_url);

        let http_response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .json(req)
            .send()
            .await?;

        let status = http_response.status();
        tracing::debug!(%status, model = %req.model, "OpenAI response status");

        if status == 401 || status == 403 {
            return Err(OpenAiError::Auth { status: status.as_u16() });
        }

        if status == 429 {
            return Err(OpenAiError::RateLimited);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(OpenAiError::Http { status: status.as_u16() });
        }

        let bytes = http_response.bytes().await?;
        let response: ChatResponse = serde_json::from_slice(&bytes).map_err(|e| OpenAiError::Parse(e.to_string()))?;

        tracing::debug!(elapsed = ?start.elapsed(), "completion received");
        response.into_content()
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn correct(&self, query: &str) -> Result<Completion, UpstreamError> {
        let reply = self.complete(&self.correction_request(query)).await?;
        Ok(parse_correction(query, &reply)?)
    }

    async fn suggest_alternatives(&self, query: &str, count: usize) -> Result<Vec<String>, UpstreamError> {
        let reply = self.complete(&self.alternatives_request(query, count)).await?;
        Ok(parse_alternatives(&reply, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    fn reply(content: &str) -> String {
        serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
    }

    fn client(base_url: String) -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig { base_url, ..OpenAiConfig::new("sk-test") }).unwrap()
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(OpenAiClient::new(OpenAiConfig::new("")), Err(OpenAiError::MissingApiKey)));
        assert!(OpenAiConfig::from_app_config(&AppConfig::default()).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = OpenAiConfig::new("sk-secret");
        assert!(!format!("{config:?}").contains("sk-secret"));
    }

    #[test]
    fn test_budgets_follow_settings() {
        let client = client(DEFAULT_BASE_URL.to_string());

        let correction = client.correction_request("harry poter");
        assert_eq!(correction.max_tokens, 50);
        assert_eq!(correction.temperature, 0.1);
        assert!(correction.response_format.is_some());

        let alternatives = client.alternatives_request("obscure sci-fi", 3);
        assert_eq!(alternatives.max_tokens, 150);
        assert_eq!(alternatives.temperature, 0.7);
        assert!(alternatives.response_format.is_none());
    }

    #[tokio::test]
    async fn test_correct_round_trip() {
        let body = reply(r#"{"suggestion": "harry potter", "confidence": 0.92}"#);
        let client = client(serve_once("200 OK", body).await);

        let completion = client.correct("harry poter").await.unwrap();
        assert_eq!(completion, Completion { suggestion: "harry potter".into(), confidence: 0.92 });
    }

    #[tokio::test]
    async fn test_suggest_alternatives_round_trip() {
        let body = reply("1. space opera\n2. hard sf\n3. cyberpunk\n4. solarpunk");
        let client = client(serve_once("200 OK", body).await);

        let alternatives = client.suggest_alternatives("obscure sci-fi", 3).await.unwrap();
        assert_eq!(alternatives, vec!["space opera", "hard sf", "cyberpunk"]);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let client1 = client(serve_once("429 Too Many Requests", String::new()).await);
        assert_eq!(client1.correct("q").await.unwrap_err(), UpstreamError::RateLimited);

        let client2 = client(serve_once("401 Unauthorized", String::new()).await);
        assert_eq!(client2.correct("q").await.unwrap_err(), UpstreamError::Auth { status: 401 });

        let client3 = client(serve_once("500 Internal Server Error", String::new()).await);
        assert_eq!(client3.correct("q").await.unwrap_err(), UpstreamError::Server { status: 500 });
    }
}
