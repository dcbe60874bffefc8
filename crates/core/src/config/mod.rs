//! Application configuration with layered loading.
//!
//! Configuration is loaded with figment from, in increasing precedence:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if FIELDCACHE_CONFIG_FILE set)
//! 3. Environment variables (FIELDCACHE_*)

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the edge listens on.
    ///
    /// Set via FIELDCACHE_LISTEN_ADDR.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Origin of the hosted application; same-origin routing is relative to it.
    ///
    /// Set via FIELDCACHE_APP_ORIGIN.
    #[serde(default = "default_app_origin")]
    pub app_origin: String,

    /// Path to the SQLite cache database.
    ///
    /// Set via FIELDCACHE_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Opaque cache version tag. Changing it retires every older store on activation.
    ///
    /// Set via FIELDCACHE_CACHE_VERSION.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Network race budget for API requests, in milliseconds.
    #[serde(default = "default_api_timeout_ms")]
    pub api_timeout_ms: u64,

    /// Network race budget for same-origin pages, in milliseconds.
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    /// Hard timeout on any single upstream exchange, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// User-Agent for requests that carry none (precache, revalidation).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum request or response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Optional cap on entries per store, enforced on activation.
    #[serde(default)]
    pub max_entries_per_store: Option<usize>,

    /// Path prefix of API routes.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path prefix of generated reports, which are never cached.
    #[serde(default = "default_report_prefix")]
    pub report_prefix: String,

    /// Precache manifest. Relative entries resolve against `app_origin`.
    ///
    /// Set via FIELDCACHE_PRECACHE as an array, e.g. `["/", "/history"]`.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_app_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./fieldcache.sqlite")
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_api_timeout_ms() -> u64 {
    5_000
}

fn default_page_timeout_ms() -> u64 {
    3_000
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    concat!("fieldcache/", env!("CARGO_PKG_VERSION")).into()
}

fn default_max_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_report_prefix() -> String {
    "/report/".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/history",
        "/manifest.json",
        "/static/icons/icon-192.png",
        "/static/icons/icon-512.png",
        "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&display=swap",
        "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css",
        "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            app_origin: default_app_origin(),
            db_path: default_db_path(),
            cache_version: default_cache_version(),
            api_timeout_ms: default_api_timeout_ms(),
            page_timeout_ms: default_page_timeout_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            max_entries_per_store: None,
            api_prefix: default_api_prefix(),
            report_prefix: default_report_prefix(),
            precache: default_precache(),
        }
    }
}

impl AppConfig {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `app_origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.app_origin)
            .map_err(|e| ConfigError::Invalid { field: "app_origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            _ => Err(ConfigError::Invalid { field: "app_origin".into(), reason: "must be an http(s) origin".into() }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FIELDCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("FIELDCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
