//! Persistent backing store for the result cache.
//!
//! [`CacheBackend`] is the key/value-with-TTL interface the in-memory tier
//! writes through to. [`CacheDb`] implements it on the `query_cache` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

use super::connection::CacheDb;
use super::entry::CacheEntry;
use crate::Error;
use crate::model::Book;

/// Size of the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BackendStats {
    pub entries: u64,
    pub total_size_kb: f64,
}

/// Key/value store with TTL metadata. Expiry decisions stay with the caller,
/// which passes its own notion of `now`.
#[async_trait]
pub trait CacheBackend: Send + Sync + std::fmt::Debug {
    /// Load an entry whether or not it has expired.
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, Error>;

    /// Insert or replace an entry.
    async fn store(&self, entry: &CacheEntry) -> Result<(), Error>;

    /// Delete `key` only if it is still the version created at `created_at`.
    async fn remove(&self, key: &str, created_at: DateTime<Utc>) -> Result<bool, Error>;

    /// Delete every entry whose expiry is before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;

    /// Delete the oldest entries until at most `max_entries` remain.
    async fn trim_to(&self, max_entries: usize) -> Result<u64, Error>;

    async fn clear(&self) -> Result<u64, Error>;

    async fn stats(&self) -> Result<BackendStats, Error>;
}

/// Stored timestamps are epoch microseconds, compared numerically in SQL.
fn timestamp(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

fn parse_timestamp(micros: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| Error::Serialization(format!("timestamp out of range: {micros}")))
}

impl CacheDb {
    /// Get a cached entry by key hash.
    ///
    /// Returns None if the key doesn't exist in the cache.
    pub async fn get_entry(&self, key_hash: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key_hash.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<(String, i64, i64)>, Error> {
                let mut stmt =
                    conn.prepare("SELECT books_json, created_at, ttl_ms FROM query_cache WHERE key_hash = ?1")?;

                let result = stmt.query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)));

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(tokio_rusqlite::rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some((books_json, created_at, ttl_ms)) = row else {
            return Ok(None);
        };

        let books: Vec<Book> = serde_json::from_str(&books_json)?;
        let ttl = Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(0));
        Ok(Some(CacheEntry::new(key_hash, books, parse_timestamp(created_at)?, ttl)))
    }

    /// Insert or update a cached entry.
    ///
    /// Uses UPSERT semantics: inserts if the key doesn't exist, updates all fields if it does.
    pub async fn put_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let key = entry.key.clone();
        let books_json = serde_json::to_string(&entry.value)?;
        let created_at = timestamp(entry.created_at);
        let expires_at = timestamp(entry.expires_at());
        let ttl_ms = i64::try_from(entry.ttl.as_millis()).unwrap_or(i64::MAX);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO query_cache (key_hash, books_json, created_at, ttl_ms, expires_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(key_hash) DO UPDATE SET
                        books_json = excluded.books_json,
                        created_at = excluded.created_at,
                        ttl_ms = excluded.ttl_ms,
                        expires_at = excluded.expires_at",
                    params![key, books_json, created_at, ttl_ms, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one version of an entry. Returns whether a row was removed.
    pub async fn delete_entry(&self, key_hash: &str, created_at: DateTime<Utc>) -> Result<bool, Error> {
        let key = key_hash.to_string();
        let created_at = timestamp(created_at);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM query_cache WHERE key_hash = ?1 AND created_at = ?2",
                    params![key, created_at],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_entries(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let now = timestamp(now);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM query_cache WHERE expires_at < ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Keep only the newest `max_entries` entries.
    pub async fn purge_oldest_entries(&self, max_entries: usize) -> Result<u64, Error> {
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM query_cache", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM query_cache WHERE key_hash IN (
                    SELECT key_hash FROM query_cache ORDER BY created_at ASC LIMIT ?1
                )",
                    params![to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn clear_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM query_cache", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn entry_stats(&self) -> Result<BackendStats, Error> {
        self.conn
            .call(|conn| -> Result<BackendStats, Error> {
                let (entries, total_bytes): (i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(LENGTH(books_json)), 0) FROM query_cache",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(BackendStats {
                    entries: entries as u64,
                    total_size_kb: (total_bytes as f64 / 1024.0 * 100.0).round() / 100.0,
                })
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheBackend for CacheDb {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        self.get_entry(key).await
    }

    async fn store(&self, entry: &CacheEntry) -> Result<(), Error> {
        self.put_entry(entry).await
    }

    async fn remove(&self, key: &str, created_at: DateTime<Utc>) -> Result<bool, Error> {
        self.delete_entry(key, created_at).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.purge_expired_entries(now).await
    }

    async fn trim_to(&self, max_entries: usize) -> Result<u64, Error> {
        self.purge_oldest_entries(max_entries).await
    }

    async fn clear(&self) -> Result<u64, Error> {
        self.clear_entries().await
    }

    async fn stats(&self) -> Result<BackendStats, Error> {
        self.entry_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn book(id: &str) -> Book {
        Book::new(id, format!("Title {id}"), "google_books").with_authors(["Someone"])
    }

    fn entry(key: &str, created_at: DateTime<Utc>, ttl_secs: u64) -> CacheEntry {
        CacheEntry::new(key, vec![book(key)], created_at, Duration::from_secs(ttl_secs))
    }

    #[tokio::test]
    async fn test_put_and_get_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stored = entry("k1", Utc::now(), 3600);

        db.put_entry(&stored).await.unwrap();

        let loaded = db.get_entry("k1").await.unwrap().unwrap();
        assert_eq!(loaded.value, stored.value);
        assert_eq!(loaded.ttl, stored.ttl);
        assert_eq!(timestamp(loaded.created_at), timestamp(stored.created_at));
    }

    #[tokio::test]
    async fn test_far_future_expiry_is_not_purged() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.put_entry(&entry("decades", now, 1_000_000_000_000)).await.unwrap();
        db.put_entry(&CacheEntry::new("forever", vec![book("f")], now, Duration::MAX))
            .await
            .unwrap();

        assert_eq!(db.purge_expired_entries(now).await.unwrap(), 0);
        assert!(db.get_entry("decades").await.unwrap().is_some());
        assert!(db.get_entry("forever").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_missing_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_entry("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.put_entry(&entry("k1", now, 3600)).await.unwrap();
        db.put_entry(&CacheEntry::new("k1", vec![book("other")], now, Duration::from_secs(60)))
            .await
            .unwrap();

        let loaded = db.get_entry("k1").await.unwrap().unwrap();
        assert_eq!(loaded.value[0].id(), "other");
        assert_eq!(loaded.ttl, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_delete_entry_only_matching_version() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.put_entry(&entry("k1", now, 3600)).await.unwrap();

        assert!(!db.delete_entry("k1", now - TimeDelta::seconds(5)).await.unwrap());
        assert!(db.get_entry("k1").await.unwrap().is_some());

        assert!(db.delete_entry("k1", now).await.unwrap());
        assert!(db.get_entry("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.put_entry(&entry("expiring", now, 1)).await.unwrap();
        db.put_entry(&entry("fresh", now, 3600)).await.unwrap();

        let deleted = db.purge_expired_entries(now + TimeDelta::seconds(2)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get_entry("expiring").await.unwrap().is_none());
        assert!(db.get_entry("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_oldest_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.put_entry(&entry("old", now - TimeDelta::minutes(10), 3600)).await.unwrap();
        db.put_entry(&entry("mid", now - TimeDelta::minutes(5), 3600)).await.unwrap();
        db.put_entry(&entry("new", now, 3600)).await.unwrap();

        assert_eq!(db.purge_oldest_entries(2).await.unwrap(), 1);
        assert!(db.get_entry("old").await.unwrap().is_none());
        assert_eq!(db.purge_oldest_entries(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry(&entry("a", Utc::now(), 3600)).await.unwrap();
        db.put_entry(&entry("b", Utc::now(), 3600)).await.unwrap();

        let stats = db.entry_stats().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.total_size_kb > 0.0);

        assert_eq!(db.clear_entries().await.unwrap(), 2);
        assert_eq!(db.entry_stats().await.unwrap().entries, 0);
    }
}
