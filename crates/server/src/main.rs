//! fieldcache edge entry point.
//!
//! Boots the interception layer in front of the farm-advisory app: precache,
//! activate, then serve every request over HTTP. Logs go to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use fieldcache_client::{FetchClient, FetchConfig};
use fieldcache_core::{AppConfig, CacheDb, CacheRegistry};

mod error;
mod host;
mod layer;
mod offline;
mod precache;
mod router;
mod strategy;
#[cfg(test)]
mod testing;

use host::HostState;
use layer::{InterceptLayer, LayerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(origin = %config.app_origin, version = %config.cache_version, "starting fieldcache");

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database at {}", config.db_path.display()))?;
    let fetcher = FetchClient::new(FetchConfig::from(&config)).context("building http client")?;

    let registry = CacheRegistry::new(Arc::new(db), config.cache_version.clone());
    let settings = LayerSettings::from_config(&config)?;
    let layer = Arc::new(InterceptLayer::new(registry, Arc::new(fetcher), settings));

    layer.on_install().await.context("install")?;
    layer.on_activate().await.context("activate")?;

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "listening");

    let app = host::router(HostState { layer, max_bytes: config.max_bytes });
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
