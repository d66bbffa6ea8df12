//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use bookscout_core::DiscoveryService;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::{
    BookSearchParams,
    cache::{CachePurgeParams, purge_impl, stats_impl},
    search_impl,
};

/// The main MCP server handler for bookscout.
#[derive(Clone)]
pub struct BookscoutServer {
    service: Arc<DiscoveryService>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl BookscoutServer {
    /// Create a new server handler around an assembled discovery service.
    pub fn new(service: Arc<DiscoveryService>) -> Self {
        Self { service, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Search for books by natural-language query. Returns matching books, typo corrections, and alternative queries when nothing matches."
    )]
    async fn book_search(&self, params: Parameters<BookSearchParams>) -> Result<CallToolResult, McpError> {
        search_impl(&self.service, params.0).await
    }

    #[tool(description = "Show result cache occupancy: entries, capacity, TTL, and backing store size.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(self.service.cache()).await
    }

    #[tool(description = "Purge the result cache. Removes expired entries, or everything when expired_only is false.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.service.cache(), params.0).await
    }
}

impl ServerHandler for BookscoutServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "bookscout".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Book discovery over Google Books with caching, retries, and AI-assisted query correction.".into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::service_with;
    use bookscout_core::testing::{FakeCompletion, FakeProvider};

    #[tokio::test]
    async fn test_tools_are_registered() {
        let service = service_with(FakeProvider::new(), FakeCompletion::correcting("unused", 0.9)).await;
        let server = BookscoutServer::new(Arc::new(service));

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["book_search", "cache_purge", "cache_stats"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let service = service_with(FakeProvider::new(), FakeCompletion::correcting("unused", 0.9)).await;
        let server = BookscoutServer::new(Arc::new(service));

        let info = server.get_info();
        assert_eq!(info.server_info.name, "bookscout");
        assert!(info.capabilities.tools.is_some());
    }
}
