//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

/// Longest accepted `cache.ttl_secs` (ten years).
pub const MAX_CACHE_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, "must be between 0.0 and 1.0"));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `request_timeout_ms` is shorter than `timeout_ms`
    /// - `user_agent` is empty or `language` is not a 2-letter code
    /// - the result limits are zero or inconsistent
    /// - any retry, cache, search or AI knob is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }
        if self.request_timeout_ms < self.timeout_ms {
            return Err(invalid("request_timeout_ms", "must be at least timeout_ms"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.language.len() != 2 || !self.language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid("language", "must be a 2-letter language code such as \"en\""));
        }

        if self.max_limit == 0 {
            return Err(invalid("max_limit", "must be greater than 0"));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(invalid("default_limit", "must be between 1 and max_limit"));
        }

        self.validate_retry()?;

        if self.cache.capacity == 0 {
            return Err(invalid("cache.capacity", "must be greater than 0"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs", "must be greater than 0"));
        }
        if self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(invalid("cache.ttl_secs", "must not exceed 10 years"));
        }

        check_unit_interval("search.similarity_threshold", self.search.similarity_threshold)?;
        check_unit_interval("search.correction_threshold", self.search.correction_threshold)?;
        check_unit_interval("search.auto_apply_threshold", self.search.auto_apply_threshold)?;
        if self.search.auto_apply_threshold < self.search.correction_threshold {
            return Err(invalid("search.auto_apply_threshold", "must not be below search.correction_threshold"));
        }
        if !(1..=10).contains(&self.search.max_suggestions) {
            return Err(invalid("search.max_suggestions", "must be between 1 and 10"));
        }

        self.validate_ai()?;

        if self.rate_limit.searches_per_minute == 0 {
            tracing::warn!("rate_limit.searches_per_minute is 0; provider search rate limiting is disabled");
        }

        Ok(())
    }

    fn validate_retry(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if retry.max_attempts > 10 {
            return Err(invalid("retry.max_attempts", "must not exceed 10"));
        }
        if retry.initial_delay_ms == 0 {
            return Err(invalid("retry.initial_delay_ms", "must be greater than 0"));
        }
        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier <= 1.0 {
            return Err(invalid("retry.backoff_multiplier", "must be greater than 1.0"));
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(invalid("retry.max_delay_ms", "must be at least retry.initial_delay_ms"));
        }
        Ok(())
    }

    fn validate_ai(&self) -> Result<(), ConfigError> {
        let ai = &self.ai;
        if ai.model.is_empty() {
            return Err(invalid("ai.model", "must not be empty"));
        }
        for (field, tokens) in [
            ("ai.max_tokens_short", ai.max_tokens_short),
            ("ai.max_tokens_medium", ai.max_tokens_medium),
            ("ai.max_tokens_long", ai.max_tokens_long),
        ] {
            if tokens == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }
        for (field, temperature) in [
            ("ai.temperature_precise", ai.temperature_precise),
            ("ai.temperature_balanced", ai.temperature_balanced),
            ("ai.temperature_creative", ai.temperature_creative),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(invalid(field, "must be between 0.0 and 2.0"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetrySettings, SearchSettings};

    fn field_of(result: Result<(), ConfigError>) -> Option<String> {
        match result {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, request_timeout_ms: 400_000, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("timeout_ms"));
    }

    #[test]
    fn test_validate_request_timeout_shorter_than_call_timeout() {
        let config = AppConfig { timeout_ms: 10_000, request_timeout_ms: 5_000, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("request_timeout_ms"));
    }

    #[test]
    fn test_validate_limits() {
        let config = AppConfig { default_limit: 50, max_limit: 40, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("default_limit"));
    }

    #[test]
    fn test_validate_retry_zero_attempts() {
        let config = AppConfig { retry: RetrySettings { max_attempts: 0, ..Default::default() }, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("retry.max_attempts"));
    }

    #[test]
    fn test_validate_retry_multiplier_must_grow() {
        let config =
            AppConfig { retry: RetrySettings { backoff_multiplier: 1.0, ..Default::default() }, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("retry.backoff_multiplier"));
    }

    #[test]
    fn test_validate_retry_max_delay_below_initial() {
        let config = AppConfig {
            retry: RetrySettings { initial_delay_ms: 5_000, max_delay_ms: 1_000, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(field_of(config.validate()).as_deref(), Some("retry.max_delay_ms"));
    }

    #[test]
    fn test_validate_cache_capacity_zero() {
        let mut config = AppConfig::default();
        config.cache.capacity = 0;
        assert_eq!(field_of(config.validate()).as_deref(), Some("cache.capacity"));
    }

    #[test]
    fn test_validate_cache_ttl_bounds() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = MAX_CACHE_TTL_SECS;
        assert!(config.validate().is_ok());

        config.cache.ttl_secs = MAX_CACHE_TTL_SECS + 1;
        assert_eq!(field_of(config.validate()).as_deref(), Some("cache.ttl_secs"));

        config.cache.ttl_secs = 1_000_000_000_000;
        assert_eq!(field_of(config.validate()).as_deref(), Some("cache.ttl_secs"));
    }

    #[test]
    fn test_validate_language() {
        for ok in ["en", "DE", "fr"] {
            let config = AppConfig { language: ok.into(), ..Default::default() };
            assert!(config.validate().is_ok(), "{ok} should be accepted");
        }
        for bad in ["", "english", "e", "e1", "zh-CN"] {
            let config = AppConfig { language: bad.into(), ..Default::default() };
            assert_eq!(field_of(config.validate()).as_deref(), Some("language"), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_validate_thresholds() {
        let config = AppConfig {
            search: SearchSettings { similarity_threshold: 1.5, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(field_of(config.validate()).as_deref(), Some("search.similarity_threshold"));

        let config = AppConfig {
            search: SearchSettings { correction_threshold: 0.9, auto_apply_threshold: 0.8, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(field_of(config.validate()).as_deref(), Some("search.auto_apply_threshold"));
    }

    #[test]
    fn test_validate_max_suggestions() {
        let config =
            AppConfig { search: SearchSettings { max_suggestions: 0, ..Default::default() }, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("search.max_suggestions"));
    }

    #[test]
    fn test_validate_ai_temperature() {
        let mut config = AppConfig::default();
        config.ai.temperature_creative = 3.0;
        assert_eq!(field_of(config.validate()).as_deref(), Some("ai.temperature_creative"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            timeout_ms: 100,
            request_timeout_ms: 100,
            default_limit: 1,
            max_limit: 1,
            retry: RetrySettings { max_attempts: 1, initial_delay_ms: 1, backoff_multiplier: 1.01, max_delay_ms: 1 },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
