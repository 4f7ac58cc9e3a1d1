//! Stellwerk - external identity and membership provisioning service
//!
//! Main entry point for the standalone sync binary.

use anyhow::Context;
use stellwerk_lib::AppContext;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging FIRST so we can see .env loading
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables from .env file
    match dotenvy::dotenv() {
        Ok(path) => tracing::info!("Loaded .env from: {:?}", path),
        Err(e) => tracing::warn!("Could not load .env file: {}", e),
    }

    let config = stellwerk_infra::config::load().context("loading configuration")?;

    tracing::info!("Stellwerk starting...");

    let mut ctx =
        AppContext::with_config(config).await.context("building application context")?;

    tracing::info!(
        queue_capacity = ctx.config.sync.event_queue_capacity,
        "Stellwerk initialized successfully; awaiting domain events"
    );

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    ctx.shutdown().await.context("stopping event worker")?;

    let snapshot = ctx.metrics.snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(counters) => tracing::info!(%counters, "Final sync counters"),
        Err(e) => tracing::warn!("Could not serialize final sync counters: {}", e),
    }

    Ok(())
}
