//! ==============================================================================
//! main.rs - reading hub entry point
//! ==============================================================================
//!
//! purpose:
//!     the hub that sensor nodes push temperature readings to. it persists
//!     every reading, keeps per-series latest/min/max summaries and serves
//!     structured data to dashboards and chart clients.
//!
//! responsibilities:
//!     - load configuration (config.rs)
//!     - initialize logging
//!     - open the reading log and replay it into the aggregator (hub.rs)
//!     - serve the http api until ctrl-c (api.rs)
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                      reading hub                            │
//!     │  ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//!     │  │ POST        │   │ GET /get     │   │ GET /history     │  │
//!     │  │ /update     │   │              │   │ GET /matrix      │  │
//!     │  └──────┬──────┘   └──────┬───────┘   └────────┬─────────┘  │
//!     │         │                 │                    │            │
//!     │    ingest.rs          aggregator.rs         store.rs        │
//!     │  (append+observe)   (cached summaries)   (sqlite log scan)  │
//!     └─────────┼─────────────────────────────────────┼─────────────┘
//!               ▼                                     ▼
//!                       data/readings.db (sqlite)
//!
//! ==============================================================================

use anyhow::{Context, Result};
use reading_hub::api;
use reading_hub::config::HubConfig;
use reading_hub::{Hub, SqliteStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let (config, source) = HubConfig::resolve()?;

    // step 2: logging, RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .with_context(|| format!("invalid log level: {}", config.logging.level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("starting reading hub");
    config.log_summary(&source);

    // step 3: open the reading log and rebuild the aggregator from it
    let store = SqliteStore::open(&config.storage.path)
        .with_context(|| format!("failed to open reading log at {}", config.storage.path.display()))?;
    let hub = Hub::open(Arc::new(store)).await.context("failed to replay reading log")?;

    // step 4: serve
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("listening on {}", addr);
    axum::serve(listener, api::router(hub))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("reading hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
