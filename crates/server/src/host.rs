//! axum edge that feeds every incoming request through the layer.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::instrument;
use url::Url;

use fieldcache_core::{InterceptedRequest, ResponseSnapshot};

use crate::error::HostError;
use crate::layer::{InterceptLayer, LayerStatus};

pub const STATUS_PATH: &str = "/__fieldcache/status";

/// Headers never replayed to the caller. Bodies are stored decoded, so the
/// upstream framing and encoding no longer apply.
const HOP_BY_HOP: &[&str] = &["connection", "keep-alive", "transfer-encoding", "content-length", "content-encoding"];

#[derive(Clone)]
pub struct HostState {
    pub layer: Arc<InterceptLayer>,
    pub max_bytes: usize,
}

pub fn router(state: HostState) -> Router {
    Router::new().route(STATUS_PATH, get(status)).fallback(intercept).with_state(state)
}

async fn status(State(state): State<HostState>) -> Result<Json<LayerStatus>, HostError> {
    Ok(Json(state.layer.status().await?))
}

#[instrument(skip_all, fields(method = %request.method(), uri = %request.uri()))]
async fn intercept(State(state): State<HostState>, request: Request) -> Result<Response, HostError> {
    let (parts, body) = request.into_parts();
    let url = target_url(state.layer.origin(), &parts.uri)?;
    if parts.uri.scheme().is_some() && !state.layer.admits(&parts.method, &url) {
        return Err(HostError::InvalidTarget(format!("{} {url} is not served by this edge", parts.method)));
    }
    let body = to_bytes(body, state.max_bytes).await.map_err(|_| HostError::BodyTooLarge(state.max_bytes))?;

    let mut headers = parts.headers;
    headers.remove(header::HOST);

    let request = InterceptedRequest { method: parts.method, url, headers, body };
    Ok(build_response(state.layer.on_intercept(request).await))
}

/// Origin-form targets resolve against the app origin; absolute-form targets
/// are taken as they are and must then pass [`InterceptLayer::admits`].
fn target_url(origin: &Url, uri: &Uri) -> Result<Url, HostError> {
    let url = if uri.scheme().is_some() {
        Url::parse(&uri.to_string())
    } else {
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        origin.join(path)
    }
    .map_err(|e| HostError::InvalidTarget(format!("{uri}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HostError::InvalidTarget(format!("unsupported scheme {other}"))),
    }
}

fn build_response(snapshot: ResponseSnapshot) -> Response {
    let mut builder = Response::builder().status(snapshot.status);

    for (name, value) in &snapshot.headers {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        if let Ok(value) = HeaderValue::from_str(value) {
            builder = builder.header(name.as_str(), value);
        }
    }

    builder.body(Body::from(snapshot.body)).unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerSettings;
    use crate::precache::PrecacheManifest;
    use crate::router::RouteRules;
    use crate::strategy::TimeoutBudgets;
    use crate::testing::MockFetcher;
    use axum::http::{Method, Request};
    use fieldcache_core::{CacheRegistry, MemoryStore};
    use std::time::Duration;
    use tower::ServiceExt;

    const LEAFLET: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

    async fn app(mock: Arc<MockFetcher>, max_bytes: usize) -> Router {
        let settings = LayerSettings {
            rules: RouteRules::new(Url::parse("https://agri.example").unwrap(), "/api/", "/report/"),
            budgets: TimeoutBudgets { api: Duration::from_millis(50), page: Duration::from_millis(50) },
            manifest: PrecacheManifest::new(["/", LEAFLET]),
            max_entries_per_store: None,
        };
        let layer = InterceptLayer::new(CacheRegistry::new(Arc::new(MemoryStore::new()), "v3"), mock, settings);
        layer.on_activate().await.unwrap();
        router(HostState { layer: Arc::new(layer), max_bytes })
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_target_url_origin_form() {
        let origin = Url::parse("https://agri.example").unwrap();
        let uri: Uri = "/api/scans?page=2".parse().unwrap();
        assert_eq!(target_url(&origin, &uri).unwrap().as_str(), "https://agri.example/api/scans?page=2");
    }

    #[test]
    fn test_target_url_absolute_form() {
        let origin = Url::parse("https://agri.example").unwrap();
        let uri: Uri = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js".parse().unwrap();
        assert_eq!(target_url(&origin, &uri).unwrap().host_str(), Some("unpkg.com"));
    }

    #[test]
    fn test_build_response_drops_hop_by_hop() {
        let snapshot = ResponseSnapshot::new(
            201,
            vec![
                ("content-type".into(), "application/json".into()),
                ("transfer-encoding".into(), "chunked".into()),
                ("content-encoding".into(), "gzip".into()),
                ("x-request-id".into(), "abc".into()),
            ],
            "{}",
        );
        let response = build_response(snapshot);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc");
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn test_get_is_served_through_layer() {
        let mock = Arc::new(MockFetcher::new());
        mock.respond("https://agri.example/api/scans", 200, r#"{"count":2}"#);
        let app = app(mock.clone(), 1024).await;

        let response = app.oneshot(Request::builder().uri("/api/scans").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(body_text(response).await, r#"{"count":2}"#);
        assert_eq!(mock.calls("https://agri.example/api/scans"), 1);
    }

    #[tokio::test]
    async fn test_post_passes_through() {
        let mock = Arc::new(MockFetcher::new());
        mock.respond("https://agri.example/chat", 200, r#"{"reply":"water less"}"#);
        let app = app(mock.clone(), 1024).await;

        let request =
            Request::builder().method(Method::POST).uri("/chat").body(Body::from(r#"{"message":"hi"}"#)).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(body_text(response).await, r#"{"reply":"water less"}"#);
        assert_eq!(mock.calls_with(&Method::POST, "https://agri.example/chat"), 1);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mock = Arc::new(MockFetcher::new());
        let app = app(mock.clone(), 8).await;

        let request = Request::builder().method(Method::POST).uri("/analyze").body(Body::from("x".repeat(64))).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(mock.calls("https://agri.example/analyze"), 0);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_offline_page() {
        let app = app(Arc::new(MockFetcher::new()), 1024).await;

        let request = Request::builder().uri("/").header(header::ACCEPT, "text/html").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("AgriCopilot - Offline"));
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let mock = Arc::new(MockFetcher::new());
        let app = app(mock.clone(), 1024).await;

        let response = app.oneshot(Request::builder().uri(STATUS_PATH).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["version"], "v3");
        assert_eq!(json["in_control"], true);
        assert_eq!(json["stores"].as_array().unwrap().len(), 2);
        assert_eq!(mock.calls("https://agri.example/__fieldcache/status"), 0);
    }

    #[tokio::test]
    async fn test_absolute_form_cross_origin_post_is_rejected() {
        let mock = Arc::new(MockFetcher::new());
        mock.respond("https://unpkg.com/upload", 200, "accepted");
        let app = app(mock.clone(), 1024).await;

        let request =
            Request::builder().method(Method::POST).uri("https://unpkg.com/upload").body(Body::from("x")).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with(r#"{"error":"INVALID_TARGET"#));
        assert_eq!(mock.calls("https://unpkg.com/upload"), 0);
    }

    #[tokio::test]
    async fn test_absolute_form_unknown_host_is_rejected() {
        let mock = Arc::new(MockFetcher::new());
        let app = app(mock.clone(), 1024).await;

        let request = Request::builder().uri("http://169.254.169.254/latest/meta-data").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(mock.calls("http://169.254.169.254/latest/meta-data"), 0);
    }

    #[tokio::test]
    async fn test_absolute_form_manifest_asset_is_served() {
        let mock = Arc::new(MockFetcher::new());
        mock.respond(LEAFLET, 200, "/* leaflet */");
        let app = app(mock.clone(), 1024).await;

        let response = app.oneshot(Request::builder().uri(LEAFLET).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "/* leaflet */");
    }
}
