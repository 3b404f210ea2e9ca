//! lantern proxy entry point.
//!
//! Boots the offline-caching worker in front of the configured origin.
//! Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use lantern_client::{FetchConfig, HttpFetcher};
use lantern_core::CacheDb;
use lantern_core::config::AppConfig;
use tracing_subscriber::EnvFilter;
use url::Url;

mod error;
mod proxy;
mod worker;

use worker::WorkerContext;
use worker::dispatch::{self, Event};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let manifest = config.manifest()?;
    let registry = config.registry(&manifest.version)?;
    let origin = Url::parse(&config.origin)?;

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = HttpFetcher::new(&FetchConfig {
        user_agent: config.user_agent.clone(),
        timeout: config.timeout(),
        max_redirects: config.max_redirects,
    })?;

    tracing::info!(
        origin = %origin,
        version = %manifest.version,
        assets = manifest.assets.len(),
        routes = config.routes.len(),
        "starting lantern"
    );

    let ctx = Arc::new(WorkerContext::new(
        registry,
        db,
        Arc::new(fetcher),
        origin,
        manifest,
        config.routes.clone(),
    ));
    let (handle, dispatcher) = dispatch::spawn(ctx.clone());

    if handle.submit(Event::Install).await.is_err() {
        anyhow::bail!("dispatcher stopped during install");
    }
    let _activation = handle.submit(Event::Activate);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "listening");

    let app = proxy::router(proxy::AppState::new(ctx, handle, config.max_body_bytes));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.await?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
