//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (BOOKSCOUT_*, nested keys separated by `__`)
//! 2. TOML config file (if BOOKSCOUT_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The resulting [`AppConfig`] is validated once at startup and passed
//! explicitly to each component.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (BOOKSCOUT_*)
/// 2. TOML config file (if BOOKSCOUT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via BOOKSCOUT_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Google Books API key. Optional; the API works unauthenticated at lower quota.
    ///
    /// Set via BOOKSCOUT_GOOGLE_BOOKS_API_KEY environment variable.
    #[serde(default)]
    pub google_books_api_key: Option<String>,

    /// OpenAI API key used for query correction and suggestions.
    ///
    /// Set via BOOKSCOUT_OPENAI_API_KEY environment variable.
    /// Required by the server at startup.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per HTTP call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Overall deadline for one search, retries included, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Language restriction passed to the metadata provider.
    #[serde(default = "default_language")]
    pub language: String,

    /// Result limit used when a request does not specify one.
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Largest result limit a request may ask for.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub ai: AiSettings,
}

/// Retry policy knobs (BOOKSCOUT_RETRY__*).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Upper bound for a single backoff wait.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay_ms: 1_000, backoff_multiplier: 2.0, max_delay_ms: 30_000 }
    }
}

/// Result cache knobs (BOOKSCOUT_CACHE__*).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of cached queries.
    pub capacity: usize,
    /// Time-to-live for a cached query, in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { capacity: 256, ttl_secs: 24 * 3600 }
    }
}

/// Rolling-window rate limits (BOOKSCOUT_RATE_LIMIT__*). Zero disables a limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Provider searches allowed per minute, process-wide.
    pub searches_per_minute: u32,
    /// AI completion calls allowed per minute, process-wide.
    pub ai_calls_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { searches_per_minute: 100, ai_calls_per_minute: 50 }
    }
}

/// Search-intelligence thresholds (BOOKSCOUT_SEARCH__*).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Best query/result similarity at or above which no correction is attempted.
    pub similarity_threshold: f64,
    /// Minimum AI confidence for a correction to be surfaced at all.
    pub correction_threshold: f64,
    /// AI confidence above which a correction is applied automatically.
    pub auto_apply_threshold: f64,
    /// Maximum number of alternative queries returned.
    pub max_suggestions: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { similarity_threshold: 0.6, correction_threshold: 0.5, auto_apply_threshold: 0.8, max_suggestions: 3 }
    }
}

/// AI completion budgets (BOOKSCOUT_AI__*).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub model: String,
    pub max_tokens_short: u32,
    pub max_tokens_medium: u32,
    pub max_tokens_long: u32,
    /// Used for corrections.
    pub temperature_precise: f32,
    pub temperature_balanced: f32,
    /// Used for alternative-query suggestions.
    pub temperature_creative: f32,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            max_tokens_short: 50,
            max_tokens_medium: 150,
            max_tokens_long: 500,
            temperature_precise: 0.1,
            temperature_balanced: 0.3,
            temperature_creative: 0.7,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./bookscout-cache.sqlite")
}

fn default_user_agent() -> String {
    "bookscout/0.1".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_language() -> String {
    "en".into()
}

fn default_limit() -> u32 {
    20
}

fn default_max_limit() -> u32 {
    40
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            google_books_api_key: None,
            openai_api_key: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            language: default_language(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            rate_limit: RateLimitSettings::default(),
            search: SearchSettings::default(),
            ai: AiSettings::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Overall per-search deadline budget.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Cache time-to-live as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// The process-wide retry policy built from the `retry` section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            backoff_multiplier: self.retry.backoff_multiplier,
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `BOOKSCOUT_`
    /// 2. TOML file from `BOOKSCOUT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("BOOKSCOUT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("BOOKSCOUT_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Fetch the OpenAI key, failing startup when it is absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the OpenAI API key is not set.
    pub fn require_openai_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| ConfigError::Missing {
            field: "openai_api_key".into(),
            hint: "Set BOOKSCOUT_OPENAI_API_KEY environment variable".into(),
        })
    }
}
