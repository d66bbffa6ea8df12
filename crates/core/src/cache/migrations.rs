//! Versioned schema for the cache backing store.
//!
//! Applied versions are recorded in `schema_version`; each pending script
//! runs inside its own transaction together with its version row.

use tokio_rusqlite::{Connection, params};

use super::Error;

/// Ordered schema scripts, keyed by version.
const SCRIPTS: &[(u32, &str)] = &[(1, include_str!("../../migrations/001_query_cache.sql"))];

/// Highest schema version this build knows about.
pub fn latest_version() -> u32 {
    SCRIPTS.last().map_or(0, |(v, _)| *v)
}

/// Bring the schema up to [`latest_version`].
///
/// # Errors
///
/// `Error::MigrationFailed` if the database is newer than this build or a
/// script fails.
pub async fn apply_pending(conn: &Connection) -> Result<u32, Error> {
    conn.call(|conn| -> Result<u32, Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current: u32 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))?;
        if current > latest_version() {
            return Err(Error::MigrationFailed(format!(
                "database schema v{current} is newer than supported v{}",
                latest_version()
            )));
        }

        for (version, script) in SCRIPTS.iter().filter(|(v, _)| *v > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(script)
                .map_err(|e| Error::MigrationFailed(format!("v{version}: {e}")))?;
            tx.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::info!(version, "cache schema migrated");
        }

        Ok(latest_version())
    })
    .await
    .map_err(Error::from)
}
