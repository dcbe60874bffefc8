//! The interception layer and its lifecycle hooks.
//!
//! The hosting mechanism drives three hooks, in order:
//!
//! 1. [`InterceptLayer::on_install`] precaches the manifest
//! 2. [`InterceptLayer::on_activate`] sweeps stale stores, then takes control
//! 3. [`InterceptLayer::on_intercept`] answers every request from then on
//!
//! Until activation completes, requests pass straight to the network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::Method;
use serde::Serialize;
use url::{Origin, Url};

use fieldcache_client::{Fetcher, resolve};
use fieldcache_core::cache::StoreStats;
use fieldcache_core::config::ConfigError;
use fieldcache_core::{AppConfig, CacheRegistry, Error, InterceptedRequest, Purpose, ResponseSnapshot};

use crate::offline;
use crate::precache::{self, InstallReport, PrecacheManifest};
use crate::router::{Route, RouteClass, RouteRules};
use crate::strategy::{self, TimeoutBudgets};

/// Everything the layer needs besides its stores and network.
#[derive(Debug, Clone)]
pub struct LayerSettings {
    pub rules: RouteRules,
    pub budgets: TimeoutBudgets,
    pub manifest: PrecacheManifest,
    pub max_entries_per_store: Option<usize>,
}

impl LayerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            rules: RouteRules::new(config.origin_url()?, &config.api_prefix, &config.report_prefix),
            budgets: TimeoutBudgets { api: config.api_timeout(), page: config.page_timeout() },
            manifest: PrecacheManifest::new(config.precache.iter().cloned()),
            max_entries_per_store: config.max_entries_per_store,
        })
    }
}

/// Outcome of activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub removed_stores: Vec<String>,
    pub trimmed_entries: u64,
}

/// Snapshot of layer state for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LayerStatus {
    pub version: String,
    pub in_control: bool,
    pub stores: Vec<StoreStats>,
}

pub struct InterceptLayer {
    registry: CacheRegistry,
    fetcher: Arc<dyn Fetcher>,
    settings: LayerSettings,
    in_control: AtomicBool,
    /// Cross-origin hosts named by the precache manifest.
    asset_origins: Vec<Origin>,
}

impl InterceptLayer {
    pub fn new(registry: CacheRegistry, fetcher: Arc<dyn Fetcher>, settings: LayerSettings) -> Self {
        let app = settings.rules.origin();
        let mut asset_origins: Vec<Origin> = Vec::new();
        for entry in settings.manifest.entries() {
            let Ok(url) = resolve(app, entry) else { continue };
            let origin = url.origin();
            if !settings.rules.is_same_origin(&url) && !asset_origins.contains(&origin) {
                asset_origins.push(origin);
            }
        }
        Self { registry, fetcher, settings, in_control: AtomicBool::new(false), asset_origins }
    }

    /// Whether an absolute-form target may be forwarded at all.
    ///
    /// Any method may reach the app origin. Other hosts are limited to GETs
    /// against origins the precache manifest names.
    pub fn admits(&self, method: &Method, url: &Url) -> bool {
        if self.settings.rules.is_same_origin(url) {
            return true;
        }
        *method == Method::GET && self.asset_origins.contains(&url.origin())
    }

    pub fn origin(&self) -> &Url {
        self.settings.rules.origin()
    }

    pub fn in_control(&self) -> bool {
        self.in_control.load(Ordering::Acquire)
    }

    /// Precache the manifest into the current static store.
    ///
    /// Only failing to open the store is an error; individual entries are
    /// best-effort and reported.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let shell = self.registry.open(Purpose::StaticShell).await?;
        if self.settings.manifest.is_empty() {
            tracing::warn!(store = %shell.name(), "precache manifest is empty");
        } else {
            tracing::debug!(store = %shell.name(), entries = self.settings.manifest.len(), "precaching");
        }
        let report =
            precache::install(&shell, self.fetcher.as_ref(), &self.settings.manifest, self.settings.rules.origin())
                .await;
        tracing::info!(
            store = %shell.name(),
            cached = report.cached,
            failed = report.failed.len(),
            "install complete"
        );
        Ok(report)
    }

    /// Retire stale stores, enforce the entry cap, then take control.
    pub async fn on_activate(&self) -> Result<ActivateReport, Error> {
        for purpose in Purpose::ALL {
            self.registry.open(purpose).await?;
        }

        let removed_stores = self.registry.sweep().await?;

        let trimmed_entries = match self.settings.max_entries_per_store {
            Some(max) => self.registry.trim(max).await?,
            None => 0,
        };

        self.in_control.store(true, Ordering::Release);
        tracing::info!(
            version = %self.registry.version(),
            removed = removed_stores.len(),
            trimmed = trimmed_entries,
            "activated and in control"
        );

        Ok(ActivateReport { removed_stores, trimmed_entries })
    }

    /// Answer one request. Never fails: every error becomes a response.
    pub async fn on_intercept(&self, request: InterceptedRequest) -> ResponseSnapshot {
        if !self.in_control() {
            return strategy::network_only(self.fetcher.as_ref(), &request).await;
        }

        let class = match self.settings.rules.classify(&request) {
            Route::Passthrough => return strategy::network_only(self.fetcher.as_ref(), &request).await,
            Route::Intercept(class) => class,
        };
        tracing::debug!(route = %class, url = %request.url, "intercepted");

        match class {
            RouteClass::Report => strategy::network_only(self.fetcher.as_ref(), &request).await,
            RouteClass::ExternalStatic => match self.registry.open(Purpose::StaticShell).await {
                Ok(cache) => strategy::cache_first(&cache, &self.fetcher, &request).await,
                Err(e) => self.uncached(class, &request, &e).await,
            },
            RouteClass::Api | RouteClass::SameOriginPage => {
                let purpose = if class == RouteClass::Api { Purpose::ApiResponse } else { Purpose::StaticShell };
                let budget = self.settings.budgets.for_class(class).unwrap_or(self.settings.budgets.api);
                match self.registry.open(purpose).await {
                    Ok(cache) => strategy::network_first(&cache, &self.fetcher, &request, budget).await,
                    Err(e) => self.uncached(class, &request, &e).await,
                }
            }
        }
    }

    /// The store could not be opened: behave as if nothing were cached.
    async fn uncached(&self, class: RouteClass, request: &InterceptedRequest, err: &Error) -> ResponseSnapshot {
        tracing::warn!(route = %class, url = %request.url, error = %err, "cache store unavailable");
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(_) if class == RouteClass::ExternalStatic => offline::no_cached_version(),
            Err(_) => offline::offline_fallback(request),
        }
    }

    pub async fn status(&self) -> Result<LayerStatus, Error> {
        Ok(LayerStatus {
            version: self.registry.version().to_string(),
            in_control: self.in_control(),
            stores: self.registry.stats().await?,
        })
    }
}
