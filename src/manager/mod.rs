// src/manager/mod.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use tokio::net::TcpListener;

use crate::config;
use crate::frontend::{Frontend, ServeExit};
use crate::metrics::MetricsCollector;
use crate::provider::{AppInfo, BackendInfo, DiscoveryEvent, Provider};
use crate::strategy::create_strategy;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("frontend for {app_id} not found")]
    FrontendNotFound { app_id: String },
}

/// Single authority over which frontends exist and their backend
/// membership. Each frontend is a TCP listener on a specific port whose
/// connections are proxied to one of the backends associated with it.
pub struct Manager {
    frontends: Arc<DashMap<String, Arc<Frontend>>>,
    metrics: Arc<MetricsCollector>,
}

impl Manager {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            frontends: Arc::new(DashMap::new()),
            metrics,
        }
    }

    /// Runs the reconciliation loop against the given provider: wires up
    /// the event channel and the stop signal, then drains exactly one
    /// event per iteration. Returns when the event stream closes. A
    /// provider setup failure is fatal.
    pub async fn start<P: Provider>(&self, provider: P) -> Result<()> {
        // Capacity 1: the provider hands over one event at a time, at the
        // pace the loop consumes them.
        let (events_tx, mut events_rx) = mpsc::channel::<DiscoveryEvent>(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        provider
            .provide(events_tx, stop_rx)
            .await
            .context("Unable to start the provider")?;

        // Held for the lifetime of the loop; dropping it on exit tells the
        // provider to wind down.
        let _stop_tx = stop_tx;

        while let Some(event) = events_rx.recv().await {
            match event {
                DiscoveryEvent::AppUpdated(app) => self.create_frontend_if_absent(&app).await,
                DiscoveryEvent::AppDestroyed(app) => self.remove_frontend(&app),
                DiscoveryEvent::BackendAdded(backend) => {
                    if let Err(e) = self.add_backend_for_app(&backend).await {
                        warn!("{}", e);
                    }
                }
                DiscoveryEvent::BackendRemoved(backend) => {
                    if let Err(e) = self.remove_backend_for_app(&backend).await {
                        warn!("{}", e);
                    }
                }
            }
        }

        info!("Event stream closed; reconciliation loop exiting");
        Ok(())
    }

    /// Creates and starts a frontend for the app if one does not exist and
    /// the app's labels make it eligible; otherwise ignores the event.
    pub async fn create_frontend_if_absent(&self, app: &AppInfo) {
        if self.frontends.contains_key(&app.app_id) {
            debug!("Frontend for {} already exists", app.app_id);
            return;
        }

        let spec = match config::frontend_spec(&app.labels) {
            Ok(Some(spec)) => spec,
            Ok(None) => {
                warn!("Load balancing not enabled for {}, ignoring", app.app_id);
                return;
            }
            Err(e) => {
                warn!("Ignoring app {}: {}", app.app_id, e);
                return;
            }
        };

        let frontend = Arc::new(Frontend::new(
            app.app_id.clone(),
            spec.port,
            create_strategy(spec.strategy),
            self.metrics.clone(),
        ));

        // A bind failure is confined to this frontend; the rest of the
        // fleet keeps running. Binding is local and effectively instant,
        // and it must precede registration so a failure leaves no registry
        // entry behind.
        match frontend.bind().await {
            Ok(listener) => self.add_frontend(frontend, listener),
            Err(e) => {
                error!("{:#}", e);
            }
        }
    }

    /// Registers the frontend and spawns its accept loop. A frontend whose
    /// listener fails is deregistered again, so a later app event can
    /// recreate it instead of hitting a dead entry.
    pub fn add_frontend(&self, frontend: Arc<Frontend>, listener: TcpListener) {
        self.frontends
            .insert(frontend.app_id().to_string(), frontend.clone());
        self.metrics.frontend_started();

        let frontends = self.frontends.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let app_id = frontend.app_id().to_string();
            if frontend.clone().serve(listener).await == ServeExit::Failed
                && frontends.remove(&app_id).is_some()
            {
                warn!("Deregistered frontend {} after listener failure", app_id);
                metrics.frontend_stopped();
            }
        });
    }

    /// Removes the frontend associated with the app, shutting its listener
    /// down gracefully. In-flight connections are not touched.
    pub fn remove_frontend(&self, app: &AppInfo) {
        if let Some((_, frontend)) = self.frontends.remove(&app.app_id) {
            frontend.stop();
            self.metrics.frontend_stopped();
        }
    }

    /// Adds the backend to the frontend of its app.
    pub async fn add_backend_for_app(&self, backend: &BackendInfo) -> Result<(), ManagerError> {
        match self.frontend(&backend.app_id) {
            Some(frontend) => {
                frontend.add_backend(&backend.endpoint).await;
                Ok(())
            }
            None => Err(ManagerError::FrontendNotFound {
                app_id: backend.app_id.clone(),
            }),
        }
    }

    /// Removes a specific backend from the frontend of its app.
    pub async fn remove_backend_for_app(&self, backend: &BackendInfo) -> Result<(), ManagerError> {
        match self.frontend(&backend.app_id) {
            Some(frontend) => {
                frontend.remove_backend(&backend.endpoint).await;
                Ok(())
            }
            None => Err(ManagerError::FrontendNotFound {
                app_id: backend.app_id.clone(),
            }),
        }
    }

    pub fn frontend(&self, app_id: &str) -> Option<Arc<Frontend>> {
        self.frontends.get(app_id).map(|f| f.clone())
    }

    pub fn frontend_count(&self) -> usize {
        self.frontends.len()
    }
}
