// src/main.rs
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

mod config;
mod frontend;
mod manager;
mod metrics;
mod provider;
mod proxy;
mod strategy;

use crate::manager::Manager;
use crate::metrics::MetricsRegistry;
use crate::provider::StaticFileProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tcplb=debug".parse()?),
        )
        .init();

    // Load the topology for the static provider
    let topology_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "topology.yaml".to_string());

    info!("Loading topology from: {}", topology_path);
    let topology = config::load_config(&topology_path).await?;

    // Initialize metrics; the collector is passed down from here, never
    // reached through a global.
    let metrics_registry = Arc::new(MetricsRegistry::new()?);
    let collector = metrics_registry.collector();
    metrics::spawn_reporter(metrics_registry, Duration::from_secs(60));

    let provider = StaticFileProvider::new(topology);
    let manager = Manager::new(collector);

    info!("Starting tcplb ...");
    tokio::select! {
        res = manager.start(provider) => {
            res?;
        }
        _ = shutdown_signal() => {}
    }

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
