// src/provider/static_file.rs
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::{self, TopologyConfig};
use crate::provider::{AppInfo, BackendInfo, DiscoveryEvent, Provider};

/// Provider fed from a static topology file: emits the configured apps and
/// backends once, then idles until told to stop. Useful for fixed fleets
/// and for exercising the manager without an orchestrator.
pub struct StaticFileProvider {
    topology: TopologyConfig,
}

impl StaticFileProvider {
    pub fn new(topology: TopologyConfig) -> Self {
        Self { topology }
    }
}

#[async_trait]
impl Provider for StaticFileProvider {
    async fn provide(
        &self,
        events: mpsc::Sender<DiscoveryEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<()> {
        let topology = self.topology.clone();
        info!("Starting static provider with {} apps", topology.apps.len());

        tokio::spawn(async move {
            for app in &topology.apps {
                let sent = events
                    .send(DiscoveryEvent::AppUpdated(AppInfo {
                        app_id: app.id.clone(),
                        labels: app.labels.clone(),
                    }))
                    .await;
                if sent.is_err() {
                    return;
                }

                let index = config::port_index(&app.labels);
                for backend in &app.backends {
                    let Some(port) = backend.ports.get(index) else {
                        warn!(
                            "Backend {} of app {} has no port at index {}, skipping",
                            backend.host, app.id, index
                        );
                        continue;
                    };
                    let sent = events
                        .send(DiscoveryEvent::BackendAdded(BackendInfo {
                            app_id: app.id.clone(),
                            endpoint: format!("{}:{}", backend.host, port),
                        }))
                        .await;
                    if sent.is_err() {
                        return;
                    }
                }
            }

            info!("Static provider finished emitting topology");
            // Hold the event sender open until we are asked to stop, so the
            // reconciliation loop keeps running.
            let _ = stop.changed().await;
            info!("Static provider stopping");
        });

        Ok(())
    }
}
