//! Versioned cache registry and lifecycle operations.
//!
//! The registry owns one store per [`Purpose`], named `{purpose-tag}-{version}`.
//! Any store whose name starts with a known purpose tag belongs to this layer;
//! [`CacheRegistry::sweep`] deletes those that are not the current version.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::{CacheStorage, RequestKey, ResponseSnapshot};
use crate::Error;

/// What a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    /// Precached app shell, same-origin pages and external static assets.
    StaticShell,
    /// API responses.
    ApiResponse,
}

impl Purpose {
    pub const ALL: [Purpose; 2] = [Purpose::StaticShell, Purpose::ApiResponse];

    pub fn tag(self) -> &'static str {
        match self {
            Purpose::StaticShell => "static-shell",
            Purpose::ApiResponse => "api-response",
        }
    }
}

/// Name of a versioned store: `{purpose-tag}-{version}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheName(String);

impl CacheName {
    pub fn new(purpose: Purpose, version: &str) -> Self {
        Self(format!("{}-{version}", purpose.tag()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a raw store name falls inside this layer's namespace.
    pub fn in_namespace(name: &str) -> bool {
        Purpose::ALL
            .iter()
            .any(|p| name.strip_prefix(p.tag()).is_some_and(|rest| rest.starts_with('-')))
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Borrowed view of one opened store. Cheap to clone.
#[derive(Clone)]
pub struct CacheHandle {
    name: CacheName,
    storage: Arc<dyn CacheStorage>,
}

impl fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle").field("name", &self.name).finish_non_exhaustive()
    }
}

impl CacheHandle {
    pub fn name(&self) -> &CacheName {
        &self.name
    }

    pub async fn lookup(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        self.storage.get(self.name.as_str(), key).await
    }

    /// Store a snapshot. Non-success responses are rejected and never written.
    pub async fn put(&self, key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<(), Error> {
        if !snapshot.is_success() {
            return Err(Error::InvalidInput(format!(
                "refusing to cache status {} for {key}",
                snapshot.status
            )));
        }
        self.storage.put(self.name.as_str(), key, snapshot).await
    }
}

/// Entry count for one current store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub name: String,
    pub purpose: Purpose,
    pub entries: u64,
}

/// Owns the current-version stores for every purpose.
#[derive(Clone)]
pub struct CacheRegistry {
    storage: Arc<dyn CacheStorage>,
    version: String,
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry").field("version", &self.version).finish_non_exhaustive()
    }
}

impl CacheRegistry {
    pub fn new(storage: Arc<dyn CacheStorage>, version: impl Into<String>) -> Self {
        Self { storage, version: version.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self, purpose: Purpose) -> CacheName {
        CacheName::new(purpose, &self.version)
    }

    /// Current-version names for every purpose.
    pub fn current_names(&self) -> Vec<CacheName> {
        Purpose::ALL.iter().map(|p| self.name(*p)).collect()
    }

    /// Open (creating if needed) the current store for a purpose.
    pub async fn open(&self, purpose: Purpose) -> Result<CacheHandle, Error> {
        let name = self.name(purpose);
        self.storage.open_store(name.as_str()).await?;
        Ok(CacheHandle { name, storage: Arc::clone(&self.storage) })
    }

    /// Delete every store in the namespace that is not a current version.
    ///
    /// A failed delete is logged and skipped. Returns the names removed.
    pub async fn sweep(&self) -> Result<Vec<String>, Error> {
        let current: Vec<String> = self.current_names().into_iter().map(|n| n.0).collect();
        let mut removed = Vec::new();

        for name in self.storage.store_names().await? {
            if !CacheName::in_namespace(&name) || current.contains(&name) {
                continue;
            }
            match self.storage.delete_store(&name).await {
                Ok(_) => {
                    tracing::info!(store = %name, "deleted stale cache store");
                    removed.push(name);
                }
                Err(e) => tracing::warn!(store = %name, error = %e, "failed to delete stale cache store"),
            }
        }

        Ok(removed)
    }

    /// Keep at most `max_entries` newest entries in each current store.
    pub async fn trim(&self, max_entries: usize) -> Result<u64, Error> {
        let mut deleted = 0;
        for name in self.current_names() {
            deleted += self.storage.trim(name.as_str(), max_entries).await?;
        }
        Ok(deleted)
    }

    pub async fn stats(&self) -> Result<Vec<StoreStats>, Error> {
        let mut stats = Vec::with_capacity(Purpose::ALL.len());
        for purpose in Purpose::ALL {
            let name = self.name(purpose);
            let entries = self.storage.entry_count(name.as_str()).await?;
            stats.push(StoreStats { name: name.0, purpose, entries });
        }
        Ok(stats)
    }
}
