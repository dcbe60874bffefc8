//! Schema versions for the store file.
//!
//! Applied synchronously on the connection thread. `schema_version` records
//! each batch so reopening a file never reapplies one.

use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::Connection;

use crate::Error;

const SCHEMA: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_cache_stores.sql"))];

/// Version a freshly opened file ends up at.
pub(crate) const LATEST: i64 = 1;

pub(crate) fn current_version(conn: &Connection) -> Result<i64, Error> {
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))?)
}

/// Bring the schema up to [`LATEST`] and return the resulting version.
pub(crate) fn apply(conn: &Connection) -> Result<i64, Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )?;

    let start = current_version(conn)?;
    let mut version = start;
    for &(next, sql) in SCHEMA.iter().filter(|(v, _)| *v > start) {
        conn.execute_batch(sql).map_err(|e| Error::MigrationFailed(format!("version {next}: {e}")))?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![next, chrono::Utc::now().to_rfc3339()],
        )?;
        tracing::info!(version = next, "applied cache schema");
        version = next;
    }

    Ok(version)
}
