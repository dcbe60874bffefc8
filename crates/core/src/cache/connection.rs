//! SQLite-backed store file.
//!
//! One file holds every named store. Opening it applies pragmas and brings
//! the schema up to date in a single round trip to the connection thread.

use std::path::Path;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA busy_timeout=5000;
     PRAGMA foreign_keys=ON;";

/// Durable [`CacheStorage`](super::CacheStorage) implementation.
///
/// Cloning is cheap and every clone shares the same background connection.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open or create the store file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        tracing::debug!(path = %path.display(), "opening cache database");
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        let version = conn
            .call(|conn| -> Result<i64, Error> {
                conn.execute_batch(PRAGMAS)?;
                migrations::apply(conn)
            })
            .await?;
        tracing::debug!(schema_version = version, "cache database ready");
        Ok(Self { conn })
    }

    /// Highest applied schema version.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| -> Result<i64, Error> { migrations::current_version(conn) })
            .await
            .map_err(Error::from)
    }
}
