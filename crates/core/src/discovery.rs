//! Book discovery facade.
//!
//! [`DiscoveryService::search`] runs one request through
//! `CacheCheck -> Fetching -> Analyzing -> Storing -> Done`. Validation,
//! rate limiting, and provider failures end the request. Cache and AI
//! failures are absorbed and flag the outcome as degraded.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::Error;
use crate::cache::{CacheStore, fingerprint};
use crate::config::AppConfig;
use crate::intelligence::SearchIntelligence;
use crate::model::{Book, CorrectionStatus, SearchQuery, SuggestionSet};
use crate::provider::{CompletionService, MetadataProvider, UpstreamError};
use crate::ratelimit::RateLimiter;
use crate::retry::RetryExecutor;
use crate::validation::{validate_genre, validate_limit, validate_query};

/// One search as asked for by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    pub query: String,
    /// Falls back to the configured default limit.
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub genre: Option<String>,
    /// Ask for a typo check even when the search found books.
    #[serde(default)]
    pub check_correction: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn check_correction(mut self, check: bool) -> Self {
        self.check_correction = check;
        self
    }
}

/// Everything a search produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchOutcome {
    pub books: Vec<Book>,
    pub query: SearchQuery,
    pub correction: CorrectionStatus,
    /// Alternative queries, only offered when nothing was found.
    pub suggestions: SuggestionSet,
    pub cache_hit: bool,
    /// A cache or AI failure was absorbed while serving this search.
    pub degraded: bool,
    /// The books come from an automatically applied correction.
    pub applied_correction: bool,
}

/// Request lifecycle stages, as they appear in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CacheCheck,
    Fetching,
    Analyzing,
    Storing,
    Done,
    Degraded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CacheCheck => "cache_check",
            Stage::Fetching => "fetching",
            Stage::Analyzing => "analyzing",
            Stage::Storing => "storing",
            Stage::Done => "done",
            Stage::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// Caches, fetches, and second-guesses book searches.
pub struct DiscoveryService {
    provider: Arc<dyn MetadataProvider>,
    cache: CacheStore,
    intelligence: SearchIntelligence,
    retry: RetryExecutor,
    search_limiter: RateLimiter,
    cache_ttl: Duration,
    request_timeout: Duration,
    default_limit: u32,
    max_limit: u32,
}

impl fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("cache", &self.cache)
            .field("intelligence", &self.intelligence)
            .field("retry", &self.retry)
            .field("search_limiter", &self.search_limiter)
            .finish_non_exhaustive()
    }
}

impl DiscoveryService {
    pub fn new(
        config: &AppConfig, provider: Arc<dyn MetadataProvider>, ai: Arc<dyn CompletionService>, cache: CacheStore,
    ) -> Self {
        let retry = RetryExecutor::new(config.retry_policy());
        let ai_limiter = Arc::new(RateLimiter::per_minute("ai_calls", config.rate_limit.ai_calls_per_minute));
        let intelligence = SearchIntelligence::new(ai, config.search.clone(), retry.clone(), ai_limiter);

        Self {
            provider,
            cache,
            intelligence,
            retry,
            search_limiter: RateLimiter::per_minute("searches", config.rate_limit.searches_per_minute),
            cache_ttl: config.cache_ttl(),
            request_timeout: config.request_timeout(),
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Run one search.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` for malformed input
    /// - `Error::RateLimited` when the search limiter is full
    /// - `Error::Permanent` or `Error::RetriesExhausted` when the provider fails
    pub async fn search(&self, request: SearchRequest) -> Result<SearchOutcome, Error> {
        let query = validate_query(&request.query)?;
        let limit = validate_limit(request.limit, self.default_limit, self.max_limit)?;
        let genre = validate_genre(request.genre.as_deref())?;

        let deadline = Instant::now() + self.request_timeout;
        let mut search_query = SearchQuery::new(query.as_str());
        let key = fingerprint(&query, limit, genre.as_deref());
        let mut degraded = false;

        tracing::info!(query = %search_query.normalized, limit, genre = ?genre, "search started");

        tracing::debug!(stage = %Stage::CacheCheck, key = %key);
        match self.cache.get(&key).await {
            Ok(Some(entry)) => {
                tracing::info!(query = %search_query.normalized, books = entry.value.len(), "search served from cache");
                return Ok(SearchOutcome {
                    books: entry.value,
                    query: search_query,
                    correction: CorrectionStatus::NotComputed,
                    suggestions: SuggestionSet::default(),
                    cache_hit: true,
                    degraded: false,
                    applied_correction: false,
                });
            }
            Ok(None) => {}
            Err(e) => {
                degraded = true;
                tracing::warn!(stage = %Stage::Degraded, during = %Stage::CacheCheck, error = %e, "cache lookup failed, treating as miss");
            }
        }

        tracing::debug!(stage = %Stage::Fetching);
        let mut books = self.fetch(&query, limit, genre.as_deref(), deadline).await?;

        let mut correction = CorrectionStatus::NotComputed;
        let mut suggestions = SuggestionSet::default();
        let mut applied_correction = false;
        let mut store_key = Some(key);

        if books.is_empty() || request.check_correction {
            tracing::debug!(stage = %Stage::Analyzing, results = books.len());
            correction = self.intelligence.analyze_query_and_results(&query, &books, Some(deadline)).await;
            if correction == CorrectionStatus::Unavailable {
                degraded = true;
                tracing::warn!(stage = %Stage::Degraded, during = %Stage::Analyzing, "query correction skipped");
            }

            if let Some(fix) = correction.correction() {
                search_query = search_query.with_correction(fix);

                if books.is_empty() && fix.auto_apply {
                    // Corrected results live under the corrected query's fingerprint.
                    let fixed_key = fingerprint(&fix.suggestion, limit, genre.as_deref());
                    let cached = match self.cache.get(&fixed_key).await {
                        Ok(entry) => entry.map(|e| e.value).filter(|b| !b.is_empty()),
                        Err(e) => {
                            degraded = true;
                            tracing::warn!(stage = %Stage::Degraded, during = %Stage::Analyzing, error = %e, "cache lookup for correction failed");
                            None
                        }
                    };
                    let fetched = match cached {
                        Some(hit) => {
                            store_key = None;
                            Ok(hit)
                        }
                        None => {
                            store_key = Some(fixed_key);
                            self.fetch(&fix.suggestion, limit, genre.as_deref(), deadline).await
                        }
                    };

                    match fetched {
                        Ok(corrected) if !corrected.is_empty() => {
                            tracing::info!(suggestion = %fix.suggestion, books = corrected.len(), "applied query correction");
                            books = corrected;
                            applied_correction = true;
                        }
                        Ok(_) => tracing::debug!(suggestion = %fix.suggestion, "corrected query found nothing either"),
                        Err(e) => {
                            degraded = true;
                            tracing::warn!(stage = %Stage::Degraded, during = %Stage::Analyzing, error = %e, "corrected search failed");
                        }
                    }
                }
            }

            if books.is_empty() {
                match self.intelligence.suggest_alternative_queries(&query, Some(deadline)).await {
                    Ok(set) => suggestions = set,
                    Err(e) => {
                        degraded = true;
                        tracing::warn!(stage = %Stage::Degraded, during = %Stage::Analyzing, error = %e, "no alternative queries");
                    }
                }
            }
        }

        // Empty results are never cached.
        if let Some(store_key) = store_key.filter(|_| !books.is_empty()) {
            tracing::debug!(stage = %Stage::Storing, key = %store_key);
            if let Err(e) = self.cache.set(&store_key, books.clone(), self.cache_ttl).await {
                degraded = true;
                tracing::warn!(stage = %Stage::Degraded, during = %Stage::Storing, error = %e, "failed to cache results");
            }
        }

        tracing::info!(
            stage = %Stage::Done,
            query = %search_query.normalized,
            books = books.len(),
            suggestions = suggestions.len(),
            degraded,
            "search finished"
        );

        Ok(SearchOutcome {
            books,
            query: search_query,
            correction,
            suggestions,
            cache_hit: false,
            degraded,
            applied_correction,
        })
    }

    async fn fetch(&self, query: &str, limit: u32, genre: Option<&str>, deadline: Instant) -> Result<Vec<Book>, Error> {
        self.search_limiter.try_acquire()?;

        let provider_query = match genre {
            Some(genre) => format!("{query} subject:{genre}"),
            None => query.to_string(),
        };

        let mut books = self
            .retry
            .run(Some(deadline), UpstreamError::class, || self.provider.search(&provider_query, limit))
            .await?;
        books.truncate(limit as usize);

        tracing::debug!(query = %provider_query, books = books.len(), "provider returned results");
        Ok(books)
    }
}
