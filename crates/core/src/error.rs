//! Unified error types for fieldcache.
//!
//! `Network` and `Timeout` are the offline conditions the interception layer
//! recovers from locally. The rest describe storage and request plumbing.

use tokio_rusqlite::rusqlite;

/// Unified error types for the fieldcache workspace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., caching a non-success response).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unsupported URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Connection or DNS failure.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// The request did not settle within its budget.
    #[error("TIMEOUT: {0}")]
    Timeout(String),

    /// Upstream answered with a non-success status.
    #[error("UPSTREAM_ERROR: status {status}")]
    Upstream { status: u16 },

    /// Response body exceeded the configured limit.
    #[error("TOO_LARGE: {0}")]
    TooLarge(String),

    /// No stored snapshot for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// The store refused or failed a write.
    #[error("CACHE_WRITE_FAILED: {0}")]
    CacheWrite(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// True for failures that mean "the network could not answer".
    pub fn is_offline(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
