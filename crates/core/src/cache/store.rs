//! Size-bounded, time-boxed result cache.
//!
//! The in-memory tier is an LRU map; every write goes to the backing store
//! first so a failed write never leaves memory ahead of disk. Reads fall
//! through to the backing store on a memory miss. Operations on one key are
//! serialized by a striped async lock; different keys proceed in parallel
//! unless they share a stripe.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::backend::{BackendStats, CacheBackend};
use super::entry::CacheEntry;
use crate::Error;
use crate::clock::{Clock, SystemClock};
use crate::model::Book;

const LOCK_STRIPES: usize = 16;

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub default_ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendStats>,
}

/// Result cache keyed by query fingerprint.
#[derive(Debug)]
pub struct CacheStore {
    memory: Mutex<LruCache<String, CacheEntry>>,
    backend: Option<Arc<dyn CacheBackend>>,
    stripes: Vec<tokio::sync::Mutex<()>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

/// Keep an existing `CacheUnavailable` as is, wrap anything else.
fn unavailable(err: Error) -> Error {
    match err {
        Error::CacheUnavailable(_) => err,
        other => Error::CacheUnavailable(other.to_string()),
    }
}

impl CacheStore {
    /// Memory-only cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            backend: None,
            stripes: (0..LOCK_STRIPES).map(|_| tokio::sync::Mutex::new(())).collect(),
            clock: Arc::new(SystemClock),
            default_ttl,
        }
    }

    /// Write through to (and read through from) a persistent store.
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn capacity(&self) -> usize {
        self.memory.lock().cap().get()
    }

    fn stripe(&self, key: &str) -> &tokio::sync::Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }

    /// Look up an unexpired entry, refreshing its recency.
    ///
    /// Expired entries are purged on the way out and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheUnavailable` if the backing store cannot be read.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let _guard = self.stripe(key).lock().await;
        let now = self.clock.now();

        let expired = {
            let mut memory = self.memory.lock();
            let live = memory.get(key).map(|entry| (!entry.is_expired(now)).then(|| entry.clone()));
            match live {
                Some(Some(entry)) => {
                    tracing::debug!(key, "cache hit (memory)");
                    return Ok(Some(entry));
                }
                Some(None) => memory.pop(key),
                None => None,
            }
        };

        if let Some(stale) = expired {
            tracing::debug!(key, "cache entry expired");
            self.forget(vec![stale]).await;
            return Ok(None);
        }

        let Some(backend) = &self.backend else {
            tracing::debug!(key, "cache miss");
            return Ok(None);
        };

        match backend.load(key).await.map_err(unavailable)? {
            Some(entry) if !entry.is_expired(now) => {
                tracing::debug!(key, "cache hit (backing store)");
                let evicted = self.admit(entry.clone(), now);
                self.forget(evicted).await;
                Ok(Some(entry))
            }
            Some(stale) => {
                tracing::debug!(key, "cache entry expired in backing store");
                self.forget(vec![stale]).await;
                Ok(None)
            }
            None => {
                tracing::debug!(key, "cache miss");
                Ok(None)
            }
        }
    }

    /// Insert or replace `key`, stamped with the current time.
    ///
    /// At capacity, expired entries are swept first and then the least
    /// recently used entry is evicted.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheUnavailable` if the backing store write fails. In
    /// that case the memory tier is left untouched.
    pub async fn set(&self, key: &str, value: Vec<Book>, ttl: Duration) -> Result<(), Error> {
        let _guard = self.stripe(key).lock().await;
        let now = self.clock.now();
        let entry = CacheEntry::new(key, value, now, ttl);

        if let Some(backend) = &self.backend {
            backend.store(&entry).await.map_err(unavailable)?;
        }

        let evicted = self.admit(entry, now);
        self.forget(evicted).await;
        tracing::debug!(key, ttl_secs = ttl.as_secs(), "cache set");
        Ok(())
    }

    /// Remove every expired entry from memory and the backing store.
    ///
    /// Returns the number of entries removed. The backing store holds every
    /// entry the memory tier does, so with a backend its count is reported.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheUnavailable` if the backing store purge fails.
    pub async fn evict_expired(&self) -> Result<u64, Error> {
        let now = self.clock.now();
        let from_memory = {
            let mut memory = self.memory.lock();
            let expired: Vec<String> =
                memory.iter().filter(|(_, e)| e.is_expired(now)).map(|(k, _)| k.clone()).collect();
            for key in &expired {
                memory.pop(key);
            }
            expired.len() as u64
        };

        let removed = match &self.backend {
            Some(backend) => backend.purge_expired(now).await.map_err(unavailable)?,
            None => from_memory,
        };
        tracing::info!(removed, "evicted expired cache entries");
        Ok(removed)
    }

    /// Drop expired rows and trim the backing store to the memory capacity.
    pub async fn prune(&self) -> Result<u64, Error> {
        let expired = self.evict_expired().await?;
        let trimmed = match &self.backend {
            Some(backend) => backend.trim_to(self.capacity()).await.map_err(unavailable)?,
            None => 0,
        };
        Ok(expired + trimmed)
    }

    /// Remove everything. Returns how many entries were dropped.
    pub async fn clear(&self) -> Result<u64, Error> {
        let from_memory = {
            let mut memory = self.memory.lock();
            let len = memory.len() as u64;
            memory.clear();
            len
        };
        let removed = match &self.backend {
            Some(backend) => backend.clear().await.map_err(unavailable)?,
            None => from_memory,
        };
        tracing::info!(removed, "cache cleared");
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats, Error> {
        let (entries, capacity) = {
            let memory = self.memory.lock();
            (memory.len(), memory.cap().get())
        };
        let backend = match &self.backend {
            Some(backend) => Some(backend.stats().await.map_err(unavailable)?),
            None => None,
        };
        Ok(CacheStats { entries, capacity, default_ttl_secs: self.default_ttl.as_secs(), backend })
    }

    /// Put `entry` into memory, returning whatever had to make room for it.
    fn admit(&self, entry: CacheEntry, now: DateTime<Utc>) -> Vec<CacheEntry> {
        let mut memory = self.memory.lock();
        let mut evicted = Vec::new();

        if !memory.contains(&entry.key) && memory.len() >= memory.cap().get() {
            let expired: Vec<String> =
                memory.iter().filter(|(_, e)| e.is_expired(now)).map(|(k, _)| k.clone()).collect();
            evicted.extend(expired.iter().filter_map(|k| memory.pop(k)));

            if memory.len() >= memory.cap().get()
                && let Some((key, lru)) = memory.pop_lru()
            {
                tracing::debug!(key, "evicting least recently used cache entry");
                evicted.push(lru);
            }
        }

        memory.put(entry.key.clone(), entry);
        evicted
    }

    /// Best-effort removal of dropped entries from the backing store.
    ///
    /// Deletes only the exact version that was dropped, so a newer write to
    /// the same key by another request survives.
    async fn forget(&self, dropped: Vec<CacheEntry>) {
        let Some(backend) = &self.backend else {
            return;
        };
        for entry in dropped {
            if let Err(e) = backend.remove(&entry.key, entry.created_at).await {
                tracing::warn!(key = entry.key, error = %e, "failed to remove cache entry from backing store");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::cache::hash::fingerprint;
    use crate::clock::ManualClock;
    use crate::testing::FailingBackend;

    const TTL: Duration = Duration::from_secs(60);

    fn books(title: &str) -> Vec<Book> {
        vec![Book::new(format!("id-{title}"), title, "google_books")]
    }

    fn store(capacity: usize) -> (CacheStore, ManualClock) {
        let clock = ManualClock::default();
        let store = CacheStore::new(capacity, TTL).with_clock(Arc::new(clock.clone()));
        (store, clock)
    }

    #[tokio::test]
    async fn test_set_then_get_until_expiry() {
        let (store, clock) = store(4);
        store.set("k", books("Dune"), TTL).await.unwrap();

        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.value, books("Dune"));

        clock.advance(TTL);
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance(Duration::from_millis(1));
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.stats().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let (store, _clock) = store(3);
        store.set("a", books("A"), TTL).await.unwrap();
        store.set("b", books("B"), TTL).await.unwrap();
        store.set("c", books("C"), TTL).await.unwrap();

        // Touch "a" so "b" becomes the least recently used.
        assert!(store.get("a").await.unwrap().is_some());

        store.set("d", books("D"), TTL).await.unwrap();

        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("c").await.unwrap().is_some());
        assert!(store.get("d").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_entries_make_room_before_lru() {
        let (store, clock) = store(2);
        store.set("short", books("Short"), Duration::from_secs(1)).await.unwrap();
        store.set("long", books("Long"), TTL).await.unwrap();
        // "short" is now the most recently used but has expired.
        assert!(store.get("short").await.unwrap().is_some());
        clock.advance(Duration::from_secs(2));

        store.set("new", books("New"), TTL).await.unwrap();

        assert!(store.get("long").await.unwrap().is_some());
        assert!(store.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_replacing_key_does_not_evict() {
        let (store, _clock) = store(2);
        store.set("a", books("A"), TTL).await.unwrap();
        store.set("b", books("B"), TTL).await.unwrap();
        store.set("a", books("A2"), TTL).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap().value, books("A2"));
        assert!(store.get("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_equivalent_queries_share_entry() {
        let (store, _clock) = store(4);
        store.set(&fingerprint("Harry Potter ", 20, None), books("Harry Potter"), TTL).await.unwrap();

        let hit = store.get(&fingerprint("harry potter", 20, None)).await.unwrap();
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let (store, clock) = store(4);
        store.set("a", books("A"), Duration::from_secs(1)).await.unwrap();
        store.set("b", books("B"), TTL).await.unwrap();
        clock.advance(Duration::from_secs(5));

        assert_eq!(store.evict_expired().await.unwrap(), 1);
        assert_eq!(store.stats().await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn test_read_through_from_backing_store() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let clock = ManualClock::default();

        let first = CacheStore::new(4, TTL).with_backend(db.clone()).with_clock(Arc::new(clock.clone()));
        first.set("k", books("Dune"), TTL).await.unwrap();

        let second = CacheStore::new(4, TTL).with_backend(db.clone()).with_clock(Arc::new(clock.clone()));
        assert_eq!(second.get("k").await.unwrap().unwrap().value, books("Dune"));
        assert_eq!(second.stats().await.unwrap().entries, 1);

        clock.advance(TTL + Duration::from_secs(1));
        let third = CacheStore::new(4, TTL).with_backend(db.clone()).with_clock(Arc::new(clock));
        assert!(third.get("k").await.unwrap().is_none());
        assert!(db.get_entry("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lru_eviction_removes_from_backing_store() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let store = CacheStore::new(1, TTL).with_backend(db.clone());

        store.set("a", books("A"), TTL).await.unwrap();
        store.set("b", books("B"), TTL).await.unwrap();

        assert!(db.get_entry("a").await.unwrap().is_none());
        assert!(db.get_entry("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_backend_failure_is_cache_unavailable() {
        let store = CacheStore::new(4, TTL).with_backend(Arc::new(FailingBackend));

        let err = store.set("k", books("Dune"), TTL).await.unwrap_err();
        assert!(matches!(err, Error::CacheUnavailable(_)));
        assert_eq!(store.stats().await.err().map(|e| e.is_fatal()), Some(false));

        // Nothing reached memory, so the next lookup falls through and fails the same way.
        assert!(matches!(store.get("k").await, Err(Error::CacheUnavailable(_))));
    }

    #[tokio::test]
    async fn test_clear_and_prune() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let store = CacheStore::new(2, TTL).with_backend(db.clone());
        store.set("a", books("A"), TTL).await.unwrap();
        store.set("b", books("B"), TTL).await.unwrap();

        assert_eq!(store.prune().await.unwrap(), 0);
        assert_eq!(store.clear().await.unwrap(), 2);
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.backend.map(|b| b.entries), Some(0));
    }

    #[tokio::test]
    async fn test_concurrent_sets_on_same_key() {
        let store = Arc::new(CacheStore::new(8, TTL));
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.set("shared", books(&format!("v{i}")), TTL).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.entries, 1);
        assert!(store.get("shared").await.unwrap().is_some());
    }
}
