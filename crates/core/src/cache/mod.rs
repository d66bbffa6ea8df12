//! Result cache for book searches.
//!
//! Two tiers: an in-memory LRU ([`CacheStore`]) that writes through to a
//! SQLite backing store ([`CacheDb`]) accessed via tokio-rusqlite. Entries
//! are keyed by a SHA-256 fingerprint of the normalized query and carry
//! their own TTL.

pub mod backend;
pub mod connection;
pub mod entry;
pub mod hash;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use backend::{BackendStats, CacheBackend};
pub use connection::CacheDb;
pub use entry::CacheEntry;
pub use hash::fingerprint;
pub use store::{CacheStats, CacheStore};
