//! cache_stats tool implementation.

use bookscout_core::{CacheStore, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};

/// Implementation of the cache_stats tool.
pub async fn stats_impl(cache: &CacheStore) -> Result<CallToolResult, McpError> {
    let stats = cache.stats().await?;
    let json = serde_json::to_string_pretty(&stats).map_err(Error::from)?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{output_text, service_with};
    use bookscout_core::testing::{FakeCompletion, FakeProvider, book};
    use bookscout_core::{CacheStats, SearchRequest};

    #[tokio::test]
    async fn test_stats_after_search() {
        let provider = FakeProvider::new().with_results("dune", vec![book("d1", "Dune", "Frank Herbert")]);
        let service = service_with(provider, FakeCompletion::correcting("unused", 0.9)).await;
        service.search(SearchRequest::new("dune")).await.unwrap();

        let result = stats_impl(service.cache()).await.unwrap();
        let stats: CacheStats = serde_json::from_str(&output_text(&result)).unwrap();

        assert_eq!(stats.entries, 1);
        assert_eq!(stats.capacity, 256);
        assert_eq!(stats.default_ttl_secs, 86_400);
        assert_eq!(stats.backend.map(|b| b.entries), Some(1));
    }
}
