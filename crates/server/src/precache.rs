//! Install-time precaching of the app shell.

use futures::future::join_all;
use serde::Serialize;
use url::Url;

use fieldcache_client::{Fetcher, resolve};
use fieldcache_core::{CacheHandle, InterceptedRequest};

/// Fixed, ordered list of URLs fetched once at install.
#[derive(Debug, Clone, Default)]
pub struct PrecacheManifest {
    entries: Vec<String>,
}

impl PrecacheManifest {
    pub fn new(entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { entries: entries.into_iter().map(Into::into).collect() }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A manifest entry that could not be cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecacheFailure {
    pub entry: String,
    pub reason: String,
}

/// Outcome of an install. Install itself never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cached: usize,
    pub failed: Vec<PrecacheFailure>,
}

/// Fetch every manifest entry independently and store the 2xx ones.
///
/// Entries are fetched concurrently as plain GETs with no custom headers. A bad
/// URL, a transport failure, a non-success status or a failed write only
/// affects its own entry.
pub async fn install(
    cache: &CacheHandle, fetcher: &dyn Fetcher, manifest: &PrecacheManifest, origin: &Url,
) -> InstallReport {
    let attempts = manifest.entries().iter().map(|entry| async move {
        let outcome = precache_one(cache, fetcher, origin, entry).await;
        (entry.clone(), outcome)
    });

    let mut report = InstallReport::default();
    for (entry, outcome) in join_all(attempts).await {
        match outcome {
            Ok(()) => report.cached += 1,
            Err(reason) => {
                tracing::warn!(entry = %entry, reason = %reason, "precache entry skipped");
                report.failed.push(PrecacheFailure { entry, reason });
            }
        }
    }
    report
}

async fn precache_one(cache: &CacheHandle, fetcher: &dyn Fetcher, origin: &Url, entry: &str) -> Result<(), String> {
    let url = resolve(origin, entry).map_err(|e| e.to_string())?;
    let request = InterceptedRequest::get(url);
    let response = fetcher.fetch(&request).await.map_err(|e| e.to_string())?;
    if !response.is_success() {
        return Err(format!("status {}", response.status));
    }
    cache.put(&request.key(), &response).await.map_err(|e| e.to_string())
}
