//! Request validation.
//!
//! Rejects malformed input before it reaches the cache or any external
//! service. Rejections are [`Error::Validation`] and are never retried.

use std::sync::LazyLock;

use regex::Regex;

use crate::Error;

pub const MAX_QUERY_CHARS: usize = 500;
pub const MAX_GENRE_CHARS: usize = 100;

static SCRIPT_INJECTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*script|javascript\s*:|on(error|click|load)\s*=").ok());

fn looks_like_injection(text: &str) -> bool {
    SCRIPT_INJECTION.as_ref().is_some_and(|re| re.is_match(text))
}

/// Check a raw query and return it trimmed, with control characters removed.
///
/// # Errors
///
/// Returns `Error::Validation` for empty, oversized, or script-bearing queries.
pub fn validate_query(raw: &str) -> Result<String, Error> {
    let cleaned: String = raw
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(Error::Validation("search query cannot be empty".into()));
    }
    if cleaned.chars().count() > MAX_QUERY_CHARS {
        return Err(Error::Validation(format!("search query too long (max {MAX_QUERY_CHARS} characters)")));
    }
    if looks_like_injection(cleaned) {
        return Err(Error::Validation("search query contains potentially harmful content".into()));
    }

    Ok(cleaned.to_string())
}

/// Resolve the requested result limit against the configured bounds.
///
/// # Errors
///
/// Returns `Error::Validation` when the limit is outside `1..=max_limit`.
pub fn validate_limit(limit: Option<u32>, default_limit: u32, max_limit: u32) -> Result<u32, Error> {
    let limit = limit.unwrap_or(default_limit);
    if limit == 0 || limit > max_limit {
        return Err(Error::Validation(format!("limit must be between 1 and {max_limit}, got {limit}")));
    }
    Ok(limit)
}

/// Trim an optional genre filter; blank genres are treated as absent.
///
/// # Errors
///
/// Returns `Error::Validation` for oversized or script-bearing genres.
pub fn validate_genre(genre: Option<&str>) -> Result<Option<String>, Error> {
    let Some(genre) = genre.map(str::trim).filter(|g| !g.is_empty()) else {
        return Ok(None);
    };
    if genre.chars().count() > MAX_GENRE_CHARS {
        return Err(Error::Validation(format!("genre too long (max {MAX_GENRE_CHARS} characters)")));
    }
    if genre.chars().any(char::is_control) || looks_like_injection(genre) {
        return Err(Error::Validation("genre contains invalid characters".into()));
    }
    Ok(Some(genre.to_string()))
}
