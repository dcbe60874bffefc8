//! Intercepted request type.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, header};
use url::Url;

use crate::cache::RequestKey;

/// Validators a browser sends when revalidating its own copy. A fetch that
/// fills a store must get a full body back, never a 304.
const CONDITIONAL_HEADERS: &[&str] = &["if-none-match", "if-modified-since", "if-match", "if-range"];

/// An outbound request as seen by the interception layer.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InterceptedRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// Plain GET with no headers, as used for precaching.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the caller declared it accepts an HTML document.
    pub fn accepts_html(&self) -> bool {
        self.headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_ascii_lowercase().contains("text/html"))
    }

    /// Copy of this request without conditional validators.
    pub fn unconditional(&self) -> Self {
        let mut request = self.clone();
        for name in CONDITIONAL_HEADERS {
            request.headers.remove(*name);
        }
        request
    }

    /// Cache identity of this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.url)
    }
}
