//! Offline fallback responses.
//!
//! Pure constructors: nothing here touches the network or a store.

use fieldcache_core::{InterceptedRequest, ResponseSnapshot};
use serde::Serialize;

/// Title of the offline page; navigations that cannot be served show it.
pub const OFFLINE_TITLE: &str = "AgriCopilot - Offline";

/// Body of the cache-first miss envelope.
pub const NO_CACHED_VERSION: &str = "Offline. No cached version available.";

/// Body of the network-first miss envelope.
pub const NETWORK_UNAVAILABLE: &str = "Network unavailable and no cached data for this request.";

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>AgriCopilot - Offline</title>
<style>
  body { margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
         font-family: system-ui, -apple-system, "Segoe UI", sans-serif; background: #f3f7f0; color: #1f3b1c; }
  main { max-width: 26rem; padding: 2rem; text-align: center; }
  .icon { font-size: 3rem; }
  h1 { font-size: 1.4rem; margin: 0.5rem 0; }
  p { line-height: 1.5; color: #44603f; }
  button { margin-top: 1rem; padding: 0.75rem 1.5rem; border: 0; border-radius: 0.5rem;
           background: #2f7d32; color: #fff; font-size: 1rem; cursor: pointer; }
</style>
</head>
<body>
<main>
  <div class="icon" aria-hidden="true">&#127793;</div>
  <h1>You're offline</h1>
  <p>AgriCopilot can't reach the network right now. Pages and scans you've already
     opened stay available. New diagnoses will work again once you're back in coverage.</p>
  <button type="button" onclick="window.location.reload()">Try again</button>
</main>
</body>
</html>
"#;

/// Error object returned to programmatic callers.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope<'a> {
    pub error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,
}

/// The offline HTML document, status 200.
pub fn offline_page() -> ResponseSnapshot {
    ResponseSnapshot::new(
        200,
        vec![
            ("content-type".into(), "text/html; charset=utf-8".into()),
            ("cache-control".into(), "no-store".into()),
        ],
        OFFLINE_PAGE,
    )
}

/// JSON error envelope with the given status.
pub fn error_envelope(status: u16, error: &str, offline: Option<bool>) -> ResponseSnapshot {
    let body = serde_json::to_vec(&ErrorEnvelope { error, offline }).unwrap_or_default();
    ResponseSnapshot::new(
        status,
        vec![
            ("content-type".into(), "application/json".into()),
            ("cache-control".into(), "no-store".into()),
        ],
        body,
    )
}

/// Cache-first miss with no network: 503 `{error}`.
pub fn no_cached_version() -> ResponseSnapshot {
    error_envelope(503, NO_CACHED_VERSION, None)
}

/// Network-first miss with no network: the offline page for HTML callers,
/// otherwise 503 `{error, offline: true}`.
pub fn offline_fallback(request: &InterceptedRequest) -> ResponseSnapshot {
    if request.accepts_html() { offline_page() } else { error_envelope(503, NETWORK_UNAVAILABLE, Some(true)) }
}
