//! Google Books volumes request parameters and validation.

use serde::Serialize;

use super::GoogleBooksError;

/// The API refuses `maxResults` above this.
pub const MAX_RESULTS_PER_PAGE: u32 = 40;

/// Query parameters for `GET /volumes`.
///
/// Based on the Books API v1 reference:
/// https://developers.google.com/books/docs/v1/reference/volumes/list
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumesRequest {
    /// Full-text query; supports operators such as `subject:` and `inauthor:`.
    pub q: String,

    /// Results per page (1-40, default 10 on the API side).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    /// Zero-based index of the first result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<u32>,

    /// Restrict to a two-letter ISO-639-1 language code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang_restrict: Option<String>,

    /// API key; anonymous requests get a smaller quota.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl VolumesRequest {
    /// Request for `q`, asking for `limit` results capped at the page maximum.
    pub fn new(q: impl Into<String>, limit: u32) -> Self {
        Self { q: q.into(), max_results: Some(limit.min(MAX_RESULTS_PER_PAGE)), ..Default::default() }
    }

    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.lang_restrict = language.filter(|l| !l.is_empty()).map(str::to_string);
        self
    }

    pub fn with_key(mut self, key: Option<&str>) -> Self {
        self.key = key.filter(|k| !k.is_empty()).map(str::to_string);
        self
    }

    /// Validate the request parameters.
    pub fn validate(&self) -> Result<(), GoogleBooksError> {
        if self.q.trim().is_empty() {
            return Err(GoogleBooksError::InvalidRequest("query cannot be empty".to_string()));
        }

        if let Some(max) = self.max_results
            && !(1..=MAX_RESULTS_PER_PAGE).contains(&max)
        {
            return Err(GoogleBooksError::InvalidRequest(format!(
                "maxResults must be 1-{MAX_RESULTS_PER_PAGE}, got {max}"
            )));
        }

        if let Some(lang) = &self.lang_restrict
            && (lang.len() != 2 || !lang.chars().all(|c| c.is_ascii_alphabetic()))
        {
            return Err(GoogleBooksError::InvalidRequest(format!("langRestrict must be a 2-letter code, got {lang}")));
        }

        Ok(())
    }
}
