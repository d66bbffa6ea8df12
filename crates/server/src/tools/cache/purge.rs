//! cache_purge tool implementation.
//!
//! Drops expired entries, or the whole cache.

use bookscout_core::{CacheStore, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Only remove expired entries (default). Set to false to clear everything.
    #[serde(default = "default_true")]
    pub expired_only: bool,
}

impl Default for CachePurgeParams {
    fn default() -> Self {
        Self { expired_only: true }
    }
}

fn default_true() -> bool {
    true
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
    pub expired_only: bool,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheStore, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let deleted = if params.expired_only { cache.evict_expired().await? } else { cache.clear().await? };

    let output = CachePurgeOutput { deleted, expired_only: params.expired_only };
    let json = serde_json::to_string_pretty(&output).map_err(Error::from)?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{output_text, service_with};
    use bookscout_core::SearchRequest;
    use bookscout_core::testing::{FakeCompletion, FakeProvider, book};

    async fn searched_service() -> bookscout_core::DiscoveryService {
        let provider = FakeProvider::new()
            .with_results("dune", vec![book("d1", "Dune", "Frank Herbert")])
            .with_results("foundation", vec![book("f1", "Foundation", "Isaac Asimov")]);
        let service = service_with(provider, FakeCompletion::correcting("unused", 0.9)).await;
        service.search(SearchRequest::new("dune")).await.unwrap();
        service.search(SearchRequest::new("foundation")).await.unwrap();
        service
    }

    #[test]
    fn test_params_default_to_expired_only() {
        let params: CachePurgeParams = serde_json::from_str("{}").unwrap();
        assert!(params.expired_only);
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_fresh_entries() {
        let service = searched_service().await;

        let result = purge_impl(service.cache(), CachePurgeParams::default()).await.unwrap();
        let output: CachePurgeOutput = serde_json::from_str(&output_text(&result)).unwrap();

        assert_eq!(output.deleted, 0);
        assert_eq!(service.cache().stats().await.unwrap().entries, 2);
    }

    #[tokio::test]
    async fn test_purge_all() {
        let service = searched_service().await;

        let result = purge_impl(service.cache(), CachePurgeParams { expired_only: false }).await.unwrap();
        let output: CachePurgeOutput = serde_json::from_str(&output_text(&result)).unwrap();

        assert_eq!(output.deleted, 2);
        assert!(!output.expired_only);

        let again = service.search(SearchRequest::new("dune")).await.unwrap();
        assert!(!again.cache_hit);
    }
}
