//! MCP tool implementations.
//!
//! This module contains all tools exposed by the bookscout server.

pub mod book_search;
pub mod cache;

pub use book_search::{BookSearchParams, search_impl};
