//! Value types shared by the cache, the search-intelligence stage and the facade.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A book returned by the metadata provider.
///
/// Fields are private: a `Book` is fully assembled with the `with_*` builders
/// before it is handed out and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Book {
    id: String,
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    categories: BTreeSet<String>,
    #[serde(default)]
    cover_url: String,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info_link: Option<String>,
}

impl Book {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            description: String::new(),
            categories: BTreeSet::new(),
            cover_url: String::new(),
            source: source.into(),
            publisher: None,
            published_date: None,
            language: None,
            page_count: None,
            rating: None,
            info_link: None,
        }
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cover_url(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = cover_url.into();
        self
    }

    pub fn with_publisher(mut self, publisher: Option<String>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_published_date(mut self, published_date: Option<String>) -> Self {
        self.published_date = published_date;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_page_count(mut self, page_count: Option<u32>) -> Self {
        self.page_count = page_count;
        self
    }

    pub fn with_rating(mut self, rating: Option<f32>) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_info_link(mut self, info_link: Option<String>) -> Self {
        self.info_link = info_link;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn cover_url(&self) -> &str {
        &self.cover_url
    }

    /// Provenance tag, e.g. `google_books`.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }

    pub fn published_date(&self) -> Option<&str> {
        self.published_date.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn rating(&self) -> Option<f32> {
        self.rating
    }

    pub fn info_link(&self) -> Option<&str> {
        self.info_link.as_deref()
    }

    /// Whether the cover URL looks usable (non-blank and longer than a bare scheme).
    pub fn has_cover(&self) -> bool {
        self.cover_url.trim().len() > 10
    }
}

/// A user query with its normalized form and any correction attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchQuery {
    pub raw: String,
    /// Lowercased, trimmed, whitespace-collapsed form of `raw`.
    pub normalized: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
    /// Confidence of `correction`, 0.0 when there is none.
    pub confidence: f64,
}

impl SearchQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = crate::intelligence::normalize(&raw);
        Self { raw, normalized, correction: None, confidence: 0.0 }
    }

    pub fn with_correction(mut self, correction: &Correction) -> Self {
        self.correction = Some(correction.suggestion.clone());
        self.confidence = correction.confidence.clamp(0.0, 1.0);
        self
    }
}

/// A typo correction proposed by the AI completion capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Correction {
    pub suggestion: String,
    pub confidence: f64,
    /// Confidence exceeded the auto-apply threshold.
    pub auto_apply: bool,
}

/// What the search-intelligence stage concluded about a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorrectionStatus {
    /// Served from cache, analysis skipped.
    NotComputed,
    /// Results matched the query well enough, or the AI found nothing to fix.
    NotNeeded,
    /// The AI capability failed or was rate limited.
    Unavailable,
    Suggested(Correction),
}

impl CorrectionStatus {
    pub fn correction(&self) -> Option<&Correction> {
        match self {
            CorrectionStatus::Suggested(c) => Some(c),
            _ => None,
        }
    }
}

/// Ordered, deduplicated alternative queries, capped at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuggestionSet(Vec<String>);

impl SuggestionSet {
    /// Build a set from raw candidates.
    ///
    /// Blank candidates and candidates equal to `original` (after
    /// normalization) are dropped; duplicates keep their first occurrence.
    pub fn from_candidates<I>(original: &str, candidates: I, cap: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let original = crate::intelligence::normalize(original);
        let mut seen = BTreeSet::new();
        let items = candidates
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .filter(|c| {
                let key = crate::intelligence::normalize(c);
                key != original && seen.insert(key)
            })
            .take(cap)
            .collect();
        Self(items)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
