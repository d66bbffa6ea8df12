//! Core types and shared functionality for bookscout.
//!
//! This crate provides:
//! - Result cache with an in-memory LRU tier over a SQLite backing store
//! - Bounded retry with exponential backoff
//! - Query normalization, typo correction, and alternative suggestions
//! - The [`DiscoveryService`] facade tying them together
//! - Unified error types and configuration

pub mod cache;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod error;
pub mod intelligence;
pub mod model;
pub mod provider;
pub mod ratelimit;
pub mod retry;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{CacheDb, CacheStats, CacheStore};
pub use config::{AppConfig, ConfigError};
pub use discovery::{DiscoveryService, SearchOutcome, SearchRequest};
pub use error::Error;
pub use model::{Book, Correction, CorrectionStatus, SearchQuery, SuggestionSet};
pub use provider::{Completion, CompletionService, MetadataProvider, UpstreamError};
pub use retry::{ErrorClass, RetryError, RetryExecutor, RetryPolicy};
