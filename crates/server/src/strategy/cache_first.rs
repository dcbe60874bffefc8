//! Cache-first with background refresh (stale-while-revalidate).

use std::sync::Arc;

use fieldcache_client::Fetcher;
use fieldcache_core::{CacheHandle, Error, InterceptedRequest, ResponseSnapshot};

use super::store;
use crate::offline;

/// Serve from the store when possible, refreshing the entry in the background.
///
/// - hit: return the snapshot now; a detached task re-fetches and overwrites
///   the entry on success, and its failures are only logged
/// - miss: fetch; a 2xx is stored and returned, anything else becomes the
///   503 "no cached version" envelope
///
/// Both fetches drop the caller's validators so upstream sends a full body.
pub async fn cache_first(
    cache: &CacheHandle, fetcher: &Arc<dyn Fetcher>, request: &InterceptedRequest,
) -> ResponseSnapshot {
    let key = request.key();

    match cache.lookup(&key).await {
        Ok(Some(hit)) => {
            tracing::debug!(store = %cache.name(), url = %key, "cache hit");
            spawn_revalidation(cache.clone(), Arc::clone(fetcher), request.unconditional());
            return hit;
        }
        Ok(None) => tracing::debug!(store = %cache.name(), url = %key, "cache miss"),
        Err(e) => tracing::warn!(store = %cache.name(), url = %key, error = %e, "cache read failed"),
    }

    match fetcher.fetch(&request.unconditional()).await {
        Ok(response) if response.is_success() => {
            store(cache, &key, &response).await;
            response
        }
        Ok(response) => {
            let err = Error::Upstream { status: response.status };
            tracing::warn!(url = %key, error = %err, "upstream error for uncached asset");
            offline::no_cached_version()
        }
        Err(e) => {
            tracing::warn!(url = %key, error = %e, "fetch failed for uncached asset");
            offline::no_cached_version()
        }
    }
}

/// Detached refresh of a cached entry. The caller already has its answer.
fn spawn_revalidation(cache: CacheHandle, fetcher: Arc<dyn Fetcher>, request: InterceptedRequest) {
    tokio::spawn(async move {
        let key = request.key();
        match fetcher.fetch(&request).await {
            Ok(response) if response.is_success() => store(&cache, &key, &response).await,
            Ok(response) => {
                let err = Error::Upstream { status: response.status };
                tracing::debug!(url = %key, error = %err, "revalidation skipped");
            }
            Err(e) => tracing::debug!(url = %key, error = %e, "revalidation failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, settle};
    use axum::http::{HeaderValue, header};
    use fieldcache_core::{CacheRegistry, MemoryStore, Purpose};
    use url::Url;

    const LEAFLET: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

    async fn static_store() -> CacheHandle {
        CacheRegistry::new(Arc::new(MemoryStore::new()), "v1")
            .open(Purpose::StaticShell)
            .await
            .unwrap()
    }

    fn request() -> InterceptedRequest {
        InterceptedRequest::get(Url::parse(LEAFLET).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_fetches_and_stores() {
        let cache = static_store().await;
        let mock = Arc::new(MockFetcher::new());
        mock.respond(LEAFLET, 200, "/* leaflet */");
        let fetcher: Arc<dyn Fetcher> = mock.clone();

        let response = cache_first(&cache, &fetcher, &request()).await;
        assert_eq!(response.status, 200);
        assert_eq!(cache.lookup(&request().key()).await.unwrap(), Some(response));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_returns_cached_and_refreshes() {
        let cache = static_store().await;
        let mock = Arc::new(MockFetcher::new());
        mock.respond(LEAFLET, 200, "v1");
        let fetcher: Arc<dyn Fetcher> = mock.clone();
        cache_first(&cache, &fetcher, &request()).await;

        mock.respond(LEAFLET, 200, "v2");
        let response = cache_first(&cache, &fetcher, &request()).await;
        assert_eq!(&response.body[..], b"v1");

        settle().await;
        let refreshed = cache.lookup(&request().key()).await.unwrap().unwrap();
        assert_eq!(&refreshed.body[..], b"v2");
        assert_eq!(mock.calls(LEAFLET), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_never_stores_errors() {
        let cache = static_store().await;
        let mock = Arc::new(MockFetcher::new());
        mock.respond(LEAFLET, 200, "good");
        let fetcher: Arc<dyn Fetcher> = mock.clone();
        cache_first(&cache, &fetcher, &request()).await;

        mock.respond(LEAFLET, 500, "bad");
        cache_first(&cache, &fetcher, &request()).await;
        settle().await;

        let cached = cache.lookup(&request().key()).await.unwrap().unwrap();
        assert_eq!(&cached.body[..], b"good");
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_repeat_is_idempotent() {
        let cache = static_store().await;
        let mock = Arc::new(MockFetcher::new());
        mock.respond(LEAFLET, 200, "/* leaflet */");
        let fetcher: Arc<dyn Fetcher> = mock.clone();
        let first = cache_first(&cache, &fetcher, &request()).await;

        mock.set_offline(true);
        for _ in 0..3 {
            let again = cache_first(&cache, &fetcher, &request()).await;
            settle().await;
            assert_eq!(again, first);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_offline_is_503_envelope() {
        let cache = static_store().await;
        let fetcher: Arc<dyn Fetcher> = Arc::new(MockFetcher::new());

        let response = cache_first(&cache, &fetcher, &request()).await;
        let expected = offline::no_cached_version();
        assert_eq!(response.status, 503);
        assert_eq!(response.body, expected.body);
        assert!(cache.lookup(&request().key()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_upstream_error_is_treated_as_miss() {
        let cache = static_store().await;
        let mock = Arc::new(MockFetcher::new());
        mock.respond(LEAFLET, 404, "gone");
        let fetcher: Arc<dyn Fetcher> = mock.clone();

        let response = cache_first(&cache, &fetcher, &request()).await;
        assert_eq!(response.status, 503);
        assert!(cache.lookup(&request().key()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_conditional_miss_fetches_full_body() {
        let cache = static_store().await;
        let mock = Arc::new(MockFetcher::new());
        mock.respond(LEAFLET, 200, "/* leaflet */");
        mock.set_honor_validators(true);
        let fetcher: Arc<dyn Fetcher> = mock.clone();
        let revalidating = request().with_header(header::IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));

        let response = cache_first(&cache, &fetcher, &revalidating).await;
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"/* leaflet */");
        assert_eq!(cache.lookup(&request().key()).await.unwrap(), Some(response));
    }

    #[tokio::test(start_paused = true)]
    async fn test_conditional_hit_refreshes_with_full_body() {
        let cache = static_store().await;
        let mock = Arc::new(MockFetcher::new());
        mock.respond(LEAFLET, 200, "v1");
        mock.set_honor_validators(true);
        let fetcher: Arc<dyn Fetcher> = mock.clone();
        cache_first(&cache, &fetcher, &request()).await;

        mock.respond(LEAFLET, 200, "v2");
        let revalidating = request()
            .with_header(header::IF_MODIFIED_SINCE, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        cache_first(&cache, &fetcher, &revalidating).await;
        settle().await;

        let refreshed = cache.lookup(&request().key()).await.unwrap().unwrap();
        assert_eq!(&refreshed.body[..], b"v2");
    }
}
