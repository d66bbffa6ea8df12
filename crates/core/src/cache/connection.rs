//! SQLite handle for the cache backing store.
//!
//! Opening a [`CacheDb`] sets WAL journaling and a busy timeout, then brings
//! the `query_cache` schema up to date.

use std::path::Path;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Persistent backing store for cached query results.
///
/// Cloning is cheap; clones share one background connection thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (or create) the cache database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty())
            && !dir.exists()
        {
            std::fs::create_dir_all(dir).map_err(|e| Error::CacheUnavailable(format!("{}: {e}", dir.display())))?;
        }

        tracing::debug!(path = %path.display(), "opening cache database");
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Throwaway database, used by tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(&format!(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA busy_timeout={BUSY_TIMEOUT_MS};"
            ))
        })
        .await
        .map_err(Error::Database)?;

        migrations::apply_pending(&conn).await?;

        Ok(Self { conn })
    }
}
