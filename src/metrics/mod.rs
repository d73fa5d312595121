// src/metrics/mod.rs
mod collector;

pub use collector::{MetricsCollector, MetricsRegistry, Timer};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Periodically dumps the text exposition of the registry to the log.
/// The core has no HTTP surface, so this is the only way metrics leave
/// the process.
pub fn spawn_reporter(registry: Arc<MetricsRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately and would log an empty registry.
        interval.tick().await;
        loop {
            interval.tick().await;
            let gathered = registry.gather();
            debug!("metrics:\n{}", String::from_utf8_lossy(&gathered));
        }
    })
}
