//! Scripted network double for strategy and layer tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, header};
use fieldcache_client::Fetcher;
use fieldcache_core::{CacheStorage, Error, InterceptedRequest, MemoryStore, RequestKey, ResponseSnapshot};

#[derive(Clone)]
struct Scripted {
    delay: Option<Duration>,
    status: u16,
    body: String,
}

/// Answers by exact URL. Unknown URLs, and every URL while offline, fail
/// with `Error::Network`.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Scripted>>,
    seen: Mutex<Vec<(Method, String)>>,
    offline: AtomicBool,
    honor_validators: AtomicBool,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.script(url, Scripted { delay: None, status, body: body.to_string() });
    }

    pub fn respond_after(&self, url: &str, delay: Duration, status: u16, body: &str) {
        self.script(url, Scripted { delay: Some(delay), status, body: body.to_string() });
    }

    fn script(&self, url: &str, scripted: Scripted) {
        self.routes.lock().unwrap().insert(url.to_string(), scripted);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Answer 304 with an empty body whenever the request carries a validator.
    pub fn set_honor_validators(&self, honor: bool) {
        self.honor_validators.store(honor, Ordering::SeqCst);
    }

    /// Number of fetches attempted for a URL, any method.
    pub fn calls(&self, url: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|(_, u)| u == url).count()
    }

    /// Number of fetches attempted with the given method and URL.
    pub fn calls_with(&self, method: &Method, url: &str) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, u)| m == method && u == url)
            .count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error> {
        let url = request.url.to_string();
        self.seen.lock().unwrap().push((request.method.clone(), url.clone()));

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }

        let scripted = self.routes.lock().unwrap().get(&url).cloned();
        let Some(scripted) = scripted else {
            return Err(Error::Network(format!("no route to {url}")));
        };

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }

        let conditional = request.headers.contains_key(header::IF_NONE_MATCH)
            || request.headers.contains_key(header::IF_MODIFIED_SINCE);
        if conditional && self.honor_validators.load(Ordering::SeqCst) {
            return Ok(ResponseSnapshot::new(304, vec![], ""));
        }

        let content_type = if scripted.body.starts_with('{') { "application/json" } else { "text/plain" };
        Ok(ResponseSnapshot::new(scripted.status, vec![("content-type".into(), content_type.into())], scripted.body))
    }
}

/// In-memory storage whose writes take `put_delay` to complete.
pub struct SlowStore {
    inner: MemoryStore,
    put_delay: Duration,
}

impl SlowStore {
    pub fn new(put_delay: Duration) -> Self {
        Self { inner: MemoryStore::new(), put_delay }
    }
}

#[async_trait]
impl CacheStorage for SlowStore {
    async fn open_store(&self, name: &str) -> Result<(), Error> {
        self.inner.open_store(name).await
    }

    async fn get(&self, store: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        self.inner.get(store, key).await
    }

    async fn put(&self, store: &str, key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<(), Error> {
        tokio::time::sleep(self.put_delay).await;
        self.inner.put(store, key, snapshot).await
    }

    async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.inner.store_names().await
    }

    async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete_store(name).await
    }

    async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        self.inner.entry_count(store).await
    }

    async fn trim(&self, store: &str, max_entries: usize) -> Result<u64, Error> {
        self.inner.trim(store, max_entries).await
    }
}

/// Let detached tasks (revalidation, late race winners) run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
