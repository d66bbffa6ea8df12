//! bookscout server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use bookscout_client::{GoogleBooksClient, GoogleBooksConfig, OpenAiClient, OpenAiConfig};
use bookscout_core::{AppConfig, CacheDb, CacheStore, DiscoveryService};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    config.require_openai_api_key()?;

    let db = CacheDb::open(&config.db_path).await?;
    let cache = CacheStore::new(config.cache.capacity, config.cache_ttl()).with_backend(Arc::new(db));
    match cache.prune().await {
        Ok(removed) => tracing::info!(removed, "pruned cache backing store"),
        Err(e) => tracing::warn!(error = %e, "cache prune failed at startup"),
    }

    let provider = GoogleBooksClient::new(GoogleBooksConfig::from(&config))?;
    let ai = OpenAiClient::new(OpenAiConfig::from_app_config(&config)?)?;
    let service = DiscoveryService::new(&config, Arc::new(provider), Arc::new(ai), cache);

    tracing::info!(db_path = %config.db_path.display(), "Starting bookscout server on stdio transport");

    let handler = handler::BookscoutServer::new(Arc::new(service));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
