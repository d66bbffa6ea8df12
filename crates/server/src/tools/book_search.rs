//! book_search tool implementation.
//!
//! Runs a search through the discovery service: cache first, then Google
//! Books with retries, then typo correction and suggestions when the
//! results look wrong or empty.

use bookscout_core::{DiscoveryService, Error, SearchRequest};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for book_search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BookSearchParams {
    /// Natural-language search query (required, max 500 chars).
    pub query: String,

    /// Number of results (1-40, default 20).
    #[serde(default)]
    pub limit: Option<u32>,

    /// Restrict to a subject/genre, e.g. "fantasy".
    #[serde(default)]
    pub genre: Option<String>,

    /// Check for typos even when the search found books.
    #[serde(default)]
    pub check_correction: bool,
}

impl From<BookSearchParams> for SearchRequest {
    fn from(params: BookSearchParams) -> Self {
        SearchRequest {
            query: params.query,
            limit: params.limit,
            genre: params.genre,
            check_correction: params.check_correction,
        }
    }
}

/// Implementation of the book_search tool.
pub async fn search_impl(service: &DiscoveryService, params: BookSearchParams) -> Result<CallToolResult, McpError> {
    let outcome = service.search(params.into()).await?;
    let json = serde_json::to_string_pretty(&outcome).map_err(Error::from)?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
