//! offline-proxy entry point.
//!
//! Boots the offline layer in front of the application origin: precache the
//! current store, prune stale versions in the background, then serve.
//! Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use offline_client::{FetchClient, FetchConfig};
use offline_core::{AppConfig, CacheDb, FetchDispatcher, Network, StoreLifecycle};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let db = CacheDb::open(&config.db_path).await?;
    let client = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let lifecycle = StoreLifecycle::new(db, config.cache_version(), config.store_prefix.clone());

    // install: the store must exist before the first request is served
    let manifest = config.precache_manifest()?;
    lifecycle.initialize(&manifest, client.as_ref()).await?;

    // activate: pruning runs alongside request handling
    let pruner = lifecycle.clone();
    tokio::spawn(async move {
        if let Err(e) = pruner.activate_current().await {
            tracing::error!(error = %e, "failed to prune stale stores");
        }
    });

    let network: Arc<dyn Network> = client.clone();
    let dispatcher = FetchDispatcher::from_config(&config, &lifecycle, network)?;
    let state = handler::ProxyState::new(dispatcher, client, config.origin_url()?);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(
        addr = %config.listen_addr,
        origin = %config.origin,
        store = %lifecycle.current_store_name(),
        "offline proxy listening"
    );

    axum::serve(listener, handler::router(state)).await?;

    Ok(())
}
