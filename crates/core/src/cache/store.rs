//! Cache store abstraction.
//!
//! The primitives a hosting environment provides: named stores that are opened
//! on demand, keyed reads and wholesale writes, and enumeration/deletion of
//! store names. Implementations must be safe for concurrent use.

use async_trait::async_trait;

use super::{RequestKey, ResponseSnapshot};
use crate::Error;

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named store if it does not exist. Idempotent.
    async fn open_store(&self, name: &str) -> Result<(), Error>;

    /// Look up a snapshot by key. `Ok(None)` is a miss.
    async fn get(&self, store: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error>;

    /// Insert or replace the snapshot for a key, creating the store if needed.
    async fn put(&self, store: &str, key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<(), Error>;

    /// All store names, sorted.
    async fn store_names(&self) -> Result<Vec<String>, Error>;

    /// Delete a store and every entry in it. Returns false if it did not exist.
    async fn delete_store(&self, name: &str) -> Result<bool, Error>;

    /// Number of entries in a store (0 for an unknown store).
    async fn entry_count(&self, store: &str) -> Result<u64, Error>;

    /// Evict the oldest entries until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    async fn trim(&self, store: &str, max_entries: usize) -> Result<u64, Error>;
}
