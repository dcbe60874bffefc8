//! HTTP fetch pipeline.
//!
//! [`Fetcher`] is the network seam of the interception layer. Unlike a
//! typical client it does not turn non-success statuses into errors: every
//! completed exchange comes back as a [`ResponseSnapshot`] so callers can
//! forward it verbatim. Only transport failures are errors:
//!
//! - connection/DNS failures map to `Error::Network`
//! - the client-side timeout maps to `Error::Timeout`
//! - bodies larger than `max_bytes` map to `Error::TooLarge`
//!
//! Bodies are decoded (gzip/brotli/deflate) before capture, so encoding and
//! framing headers are dropped from the snapshot.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, resolve};

use fieldcache_core::{Error, InterceptedRequest, ResponseSnapshot};

/// Request headers never forwarded upstream.
const SKIP_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "content-length",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "accept-encoding",
    "proxy-authorization",
    "proxy-connection",
];

/// Response headers never captured into a snapshot.
const SKIP_RESPONSE_HEADERS: &[&str] =
    &["connection", "keep-alive", "content-length", "content-encoding", "transfer-encoding", "trailer", "upgrade"];

/// Network access used by every strategy.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Send the request and capture the full response, whatever its status.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent for requests that carry none (default: "fieldcache/<version>")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 16MB)
    pub max_bytes: usize,

    /// Hard timeout for one exchange (default: 30s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("fieldcache/", env!("CARGO_PKG_VERSION")).to_string(),
            max_bytes: 16 * 1024 * 1024,
            timeout: Duration::from_millis(30_000),
            max_redirects: 5,
        }
    }
}

impl From<&fieldcache_core::AppConfig> for FetchConfig {
    fn from(config: &fieldcache_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.fetch_timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Fetcher`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .no_proxy()
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn forwardable_headers(headers: &header::HeaderMap) -> header::HeaderMap {
    let mut out = headers.clone();
    for name in SKIP_REQUEST_HEADERS {
        out.remove(*name);
    }
    out
}

fn captured_headers(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| !SKIP_RESPONSE_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
        .collect()
}

fn transport_error(err: &reqwest::Error) -> Error {
    if err.is_timeout() { Error::Timeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error> {
        let start = Instant::now();

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(forwardable_headers(&request.headers));
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| transport_error(&e))?;

        let status = response.status();
        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::TooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }

        let headers = captured_headers(response.headers());
        let bytes = response.bytes().await.map_err(|e| transport_error(&e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::TooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "upstream exchange complete"
        );

        Ok(ResponseSnapshot::new(status.as_u16(), headers, bytes))
    }
}
