//! Network-first with timeout and cache fallback.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use fieldcache_client::Fetcher;
use fieldcache_core::{CacheHandle, Error, InterceptedRequest, ResponseSnapshot};

use super::store;
use crate::offline;

/// Race a fetch against `budget`, falling back to the store.
///
/// The fetch runs in its own task and is never aborted. Its outcome is handed
/// to the racer as soon as it arrives; the store write happens afterwards in
/// the same task, so a slow store never delays or loses a fresh answer. If the
/// timer wins, the task keeps running detached: a late 2xx still lands in the
/// store for the next request, but is never returned to this caller.
///
/// - network wins with 2xx: returned, then stored
/// - network wins with anything else: returned verbatim, not stored
/// - timeout or transport failure: cached snapshot for the exact key, else
///   [`offline::offline_fallback`]
pub async fn network_first(
    cache: &CacheHandle, fetcher: &Arc<dyn Fetcher>, request: &InterceptedRequest, budget: Duration,
) -> ResponseSnapshot {
    let key = request.key();
    let (tx, rx) = oneshot::channel();

    {
        let cache = cache.clone();
        let fetcher = Arc::clone(fetcher);
        let request = request.unconditional();
        let key = key.clone();
        tokio::spawn(async move {
            let outcome = fetcher.fetch(&request).await;
            let fresh = outcome.as_ref().ok().filter(|r| r.is_success()).cloned();
            if tx.send(outcome).is_err() {
                tracing::debug!(url = %key, "race already lost, keeping result for the store");
            }
            if let Some(response) = fresh {
                store(&cache, &key, &response).await;
            }
        });
    }

    let failure = match tokio::time::timeout(budget, rx).await {
        Ok(Ok(Ok(response))) => {
            if !response.is_success() {
                let err = Error::Upstream { status: response.status };
                tracing::debug!(url = %key, error = %err, "upstream error passed through");
            }
            return response;
        }
        Ok(Ok(Err(e))) => e,
        Ok(Err(_)) => Error::Network("fetch task ended without a result".into()),
        Err(_) => Error::Timeout(format!("no response within {}ms", budget.as_millis())),
    };

    if failure.is_offline() {
        tracing::warn!(store = %cache.name(), url = %key, error = %failure, "network unavailable, trying cache");
    } else {
        tracing::warn!(store = %cache.name(), url = %key, error = %failure, "fetch failed, trying cache");
    }

    match cache.lookup(&key).await {
        Ok(Some(hit)) => {
            tracing::debug!(store = %cache.name(), url = %key, "serving cached response");
            hit
        }
        Ok(None) => {
            let miss = Error::CacheMiss(key.to_string());
            tracing::debug!(store = %cache.name(), error = %miss, "no fallback available");
            offline::offline_fallback(request)
        }
        Err(e) => {
            tracing::warn!(store = %cache.name(), url = %key, error = %e, "cache read failed");
            offline::offline_fallback(request)
        }
    }
}
