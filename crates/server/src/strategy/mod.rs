//! Caching strategies.
//!
//! Each strategy always produces a response; transport failures are absorbed
//! here and turned into a cached answer or an offline fallback.
//!
//! | route class        | strategy                                 | store          |
//! |--------------------|------------------------------------------|----------------|
//! | `ExternalStatic`   | [`cache_first`] with background refresh  | static shell   |
//! | `Api`              | [`network_first`] with API budget        | api responses  |
//! | `SameOriginPage`   | [`network_first`] with page budget       | static shell   |
//! | `Report`, non-GET  | [`network_only`]                         | none           |

mod cache_first;
mod network_first;

pub use cache_first::cache_first;
pub use network_first::network_first;

use std::time::Duration;

use fieldcache_client::Fetcher;
use fieldcache_core::{CacheHandle, Error, InterceptedRequest, RequestKey, ResponseSnapshot};

use crate::offline;
use crate::router::RouteClass;

/// Network race budget per network-first route class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutBudgets {
    pub api: Duration,
    pub page: Duration,
}

impl TimeoutBudgets {
    /// Budget for a class, or `None` if the class does not race.
    pub fn for_class(&self, class: RouteClass) -> Option<Duration> {
        match class {
            RouteClass::Api => Some(self.api),
            RouteClass::SameOriginPage => Some(self.page),
            RouteClass::Report | RouteClass::ExternalStatic => None,
        }
    }
}

/// Write a successful snapshot; a failed write is logged and otherwise ignored.
pub(crate) async fn store(cache: &CacheHandle, key: &RequestKey, snapshot: &ResponseSnapshot) {
    if !snapshot.is_success() {
        return;
    }
    match cache.put(key, snapshot).await {
        Ok(()) => tracing::debug!(store = %cache.name(), url = %key, "cached response"),
        Err(e) => tracing::warn!(store = %cache.name(), url = %key, error = %e, "cache write failed"),
    }
}

/// Forward to the network and return whatever comes back, untouched.
///
/// Used for report documents and for every non-GET request. Nothing is read
/// from or written to a store. When the network itself fails, a GET gets the
/// usual offline fallback and anything else gets a 502 envelope, since there is
/// no upstream response to forward.
pub async fn network_only(fetcher: &dyn Fetcher, request: &InterceptedRequest) -> ResponseSnapshot {
    match fetcher.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(method = %request.method, url = %request.url, error = %e, "passthrough failed");
            if request.method == axum::http::Method::GET {
                offline::offline_fallback(request)
            } else {
                offline::error_envelope(502, &unreachable_message(&e), Some(true))
            }
        }
    }
}

fn unreachable_message(err: &Error) -> String {
    match err {
        Error::Timeout(_) => "Upstream did not respond in time. The request was not queued.".into(),
        _ => "Network unavailable. The request was not sent.".into(),
    }
}
