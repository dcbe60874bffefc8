//! In-memory `CacheStorage` used in tests and ephemeral deployments.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheStorage, RequestKey, ResponseSnapshot};
use crate::Error;

type Store = HashMap<RequestKey, ResponseSnapshot>;

/// Map-of-maps cache store. Writes can be made to fail to simulate a full disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stores: RwLock<BTreeMap<String, Store>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail with `Error::CacheWrite`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for MemoryStore {
    async fn open_store(&self, name: &str) -> Result<(), Error> {
        self.stores.write().await.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, store: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        Ok(self
            .stores
            .read()
            .await
            .get(store)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, store: &str, key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::CacheWrite(format!("quota exceeded writing {key} to {store}")));
        }
        self.stores
            .write()
            .await
            .entry(store.to_string())
            .or_default()
            .insert(key.clone(), snapshot.clone());
        Ok(())
    }

    async fn store_names(&self) -> Result<Vec<String>, Error> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        Ok(self.stores.write().await.remove(name).is_some())
    }

    async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        Ok(self.stores.read().await.get(store).map_or(0, |entries| entries.len() as u64))
    }

    async fn trim(&self, store: &str, max_entries: usize) -> Result<u64, Error> {
        let mut stores = self.stores.write().await;
        let Some(entries) = stores.get_mut(store) else {
            return Ok(0);
        };
        if entries.len() <= max_entries {
            return Ok(0);
        }

        let mut by_age: Vec<_> = entries.iter().map(|(k, v)| (v.fetched_at, k.clone())).collect();
        by_age.sort();
        let excess = entries.len() - max_entries;
        for (_, key) in by_age.into_iter().take(excess) {
            entries.remove(&key);
        }
        Ok(excess as u64)
    }
}
