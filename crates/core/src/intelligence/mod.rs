//! Search-quality stage: typo correction and alternative queries.
//!
//! Decides when a query deserves a second look, asks the AI completion
//! capability for a correction or alternatives, and filters what comes back.
//! AI failures never fail a search; they are reported as
//! [`CorrectionStatus::Unavailable`] or an [`Error::AiUnavailable`] for the
//! caller to absorb.

mod similarity;

use std::sync::Arc;

use tokio::time::Instant;

pub use similarity::{book_score, normalize, partial_similarity, similarity};

use crate::Error;
use crate::config::SearchSettings;
use crate::model::{Book, Correction, CorrectionStatus, SuggestionSet};
use crate::provider::{CompletionService, UpstreamError};
use crate::ratelimit::RateLimiter;
use crate::retry::RetryExecutor;

/// Extra candidates requested so that filtering still leaves a full set.
const SUGGESTION_HEADROOM: usize = 2;

pub struct SearchIntelligence {
    ai: Arc<dyn CompletionService>,
    settings: SearchSettings,
    retry: RetryExecutor,
    limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for SearchIntelligence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIntelligence")
            .field("settings", &self.settings)
            .field("retry", &self.retry)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl SearchIntelligence {
    pub fn new(
        ai: Arc<dyn CompletionService>, settings: SearchSettings, retry: RetryExecutor, limiter: Arc<RateLimiter>,
    ) -> Self {
        Self { ai, settings, retry, limiter }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Best match score of `query` over `results` (0.0 when empty).
    pub fn best_score(&self, query: &str, results: &[Book]) -> f64 {
        results.iter().map(|book| book_score(query, book)).fold(0.0, f64::max)
    }

    /// Decide whether `query` looks mistyped given what it found.
    ///
    /// Results that match the query at or above the similarity threshold need
    /// no correction and the AI is not consulted. Otherwise the AI's proposal
    /// is kept only if it differs from the query after normalization and its
    /// confidence reaches the correction threshold.
    pub async fn analyze_query_and_results(
        &self, query: &str, results: &[Book], deadline: Option<Instant>,
    ) -> CorrectionStatus {
        if !results.is_empty() {
            let best = self.best_score(query, results);
            if best >= self.settings.similarity_threshold {
                tracing::debug!(query, best, "results match query, no correction needed");
                return CorrectionStatus::NotNeeded;
            }
        }

        if let Err(e) = self.limiter.try_acquire() {
            tracing::warn!(query, error = %e, "skipping query correction");
            return CorrectionStatus::Unavailable;
        }

        let completion = match self.retry.run(deadline, UpstreamError::class, || self.ai.correct(query)).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!(query, error = %e, "query correction unavailable");
                return CorrectionStatus::Unavailable;
            }
        };

        let suggestion = completion.suggestion.trim();
        if suggestion.is_empty() || normalize(suggestion) == normalize(query) {
            tracing::debug!(query, "no correction proposed");
            return CorrectionStatus::NotNeeded;
        }

        let confidence = completion.confidence.clamp(0.0, 1.0);
        if confidence < self.settings.correction_threshold {
            tracing::debug!(query, suggestion, confidence, "correction below confidence threshold");
            return CorrectionStatus::NotNeeded;
        }

        let auto_apply = confidence > self.settings.auto_apply_threshold;
        tracing::info!(query, suggestion, confidence, auto_apply, "query correction suggested");
        CorrectionStatus::Suggested(Correction { suggestion: suggestion.to_string(), confidence, auto_apply })
    }

    /// Related queries for a search that found nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::AiUnavailable` when the AI call fails or is rate limited.
    pub async fn suggest_alternative_queries(
        &self, query: &str, deadline: Option<Instant>,
    ) -> Result<SuggestionSet, Error> {
        self.limiter.try_acquire().map_err(|e| Error::AiUnavailable(e.to_string()))?;

        let cap = self.settings.max_suggestions;
        let candidates = self
            .retry
            .run(deadline, UpstreamError::class, || self.ai.suggest_alternatives(query, cap + SUGGESTION_HEADROOM))
            .await
            .map_err(|e| Error::AiUnavailable(e.to_string()))?;

        let suggestions = SuggestionSet::from_candidates(query, candidates, cap);
        tracing::debug!(query, count = suggestions.len(), "alternative queries proposed");
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Completion;
    use crate::retry::RetryPolicy;
    use crate::testing::FakeCompletion;
    use std::time::Duration;

    fn intelligence(ai: Arc<FakeCompletion>, ai_calls_per_minute: u32) -> SearchIntelligence {
        let policy = RetryPolicy { initial_delay: Duration::from_millis(10), ..RetryPolicy::default() };
        SearchIntelligence::new(
            ai,
            SearchSettings::default(),
            RetryExecutor::new(policy),
            Arc::new(RateLimiter::per_minute("ai", ai_calls_per_minute)),
        )
    }

    #[tokio::test]
    async fn test_typo_gets_auto_applied_correction() {
        let ai = Arc::new(FakeCompletion::correcting("harry potter", 0.92));
        let intel = intelligence(ai.clone(), 50);

        let status = intel.analyze_query_and_results("harry poter", &[], None).await;

        let correction = status.correction().unwrap();
        assert_eq!(correction.suggestion, "harry potter");
        assert_eq!(correction.confidence, 0.92);
        assert!(correction.auto_apply);
        assert_eq!(ai.correct_calls(), 1);
    }

    #[tokio::test]
    async fn test_good_results_skip_ai() {
        let ai = Arc::new(FakeCompletion::correcting("whatever", 0.99));
        let intel = intelligence(ai.clone(), 50);
        let results = vec![Book::new("1", "Dune", "test").with_authors(["Frank Herbert"])];

        let status = intel.analyze_query_and_results("dune", &results, None).await;

        assert_eq!(status, CorrectionStatus::NotNeeded);
        assert_eq!(ai.correct_calls(), 0);
    }

    #[tokio::test]
    async fn test_poor_results_consult_ai() {
        let ai = Arc::new(FakeCompletion::correcting("the hobbit", 0.7));
        let intel = intelligence(ai.clone(), 50);
        let results = vec![Book::new("1", "Cooking for Beginners", "test")];

        let status = intel.analyze_query_and_results("teh hobit", &results, None).await;

        let correction = status.correction().unwrap();
        assert!(!correction.auto_apply);
        assert_eq!(ai.correct_calls(), 1);
    }

    #[tokio::test]
    async fn test_identical_or_weak_suggestion_is_not_a_correction() {
        let ai = Arc::new(FakeCompletion::correcting("  Harry Poter ", 0.95));
        let intel = intelligence(ai, 50);
        assert_eq!(intel.analyze_query_and_results("harry poter", &[], None).await, CorrectionStatus::NotNeeded);

        let ai = Arc::new(FakeCompletion::correcting("harry potter", 0.3));
        let intel = intelligence(ai, 50);
        assert_eq!(intel.analyze_query_and_results("harry poter", &[], None).await, CorrectionStatus::NotNeeded);
    }

    #[tokio::test]
    async fn test_ai_failure_is_unavailable() {
        let ai = Arc::new(FakeCompletion::failing(UpstreamError::Auth { status: 401 }));
        let intel = intelligence(ai.clone(), 50);

        let status = intel.analyze_query_and_results("harry poter", &[], None).await;

        assert_eq!(status, CorrectionStatus::Unavailable);
        assert_eq!(ai.correct_calls(), 1);
    }

    #[tokio::test]
    async fn test_ai_rate_limit_is_unavailable() {
        let ai = Arc::new(FakeCompletion::correcting("harry potter", 0.92));
        let intel = intelligence(ai.clone(), 1);

        assert!(intel.analyze_query_and_results("harry poter", &[], None).await.correction().is_some());
        assert_eq!(intel.analyze_query_and_results("harry poter", &[], None).await, CorrectionStatus::Unavailable);
        assert_eq!(ai.correct_calls(), 1);
    }

    #[tokio::test]
    async fn test_suggestions_are_filtered_and_capped() {
        let ai = Arc::new(FakeCompletion::suggesting([
            "space opera classics",
            "Obscure Sci-Fi",
            "",
            "hard science fiction",
            "Space Opera Classics",
            "cyberpunk novels",
            "golden age science fiction",
        ]));
        let intel = intelligence(ai, 50);

        let suggestions = intel.suggest_alternative_queries("obscure sci-fi", None).await.unwrap();

        assert_eq!(
            suggestions.as_slice(),
            &["space opera classics", "hard science fiction", "cyberpunk novels"]
        );
    }

    #[tokio::test]
    async fn test_suggestion_failure_is_ai_unavailable() {
        let ai = Arc::new(FakeCompletion::failing(UpstreamError::InvalidResponse("eof".into())));
        let intel = intelligence(ai, 50);

        let err = intel.suggest_alternative_queries("obscure sci-fi", None).await.unwrap_err();
        assert!(matches!(err, Error::AiUnavailable(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_completion_value_is_clamped() {
        let ai = Arc::new(FakeCompletion::new(Ok(Completion { suggestion: "dune".into(), confidence: 7.5 }), Ok(vec![])));
        let intel = intelligence(ai, 50);

        let status = intel.analyze_query_and_results("dnue", &[], None).await;
        assert_eq!(status.correction().map(|c| c.confidence), Some(1.0));
    }
}
