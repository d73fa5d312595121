// src/frontend/mod.rs
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::metrics::MetricsCollector;
use crate::proxy::ProxyRequest;
use crate::strategy::{LoadBalancingStrategy, StrategyError};

/// How a frontend's accept loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    /// `stop()` closed the listener; normal shutdown.
    Stopped,
    /// The listener failed; the frontend can no longer accept.
    Failed,
}

/// One TCP listener for one app, proxying every accepted connection to one
/// of the app's live backends.
pub struct Frontend {
    app_id: String,
    port: u16,
    state: Mutex<FrontendState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<MetricsCollector>,
}

/// The backend set is authoritative membership; the strategy holds the
/// ordering state the data path consumes. Both live under one lock so
/// their membership stays consistent.
struct FrontendState {
    backends: HashSet<String>,
    strategy: Box<dyn LoadBalancingStrategy>,
}

impl Frontend {
    pub fn new(
        app_id: String,
        port: u16,
        strategy: Box<dyn LoadBalancingStrategy>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            app_id,
            port,
            state: Mutex::new(FrontendState {
                backends: HashSet::new(),
                strategy,
            }),
            shutdown_tx,
            shutdown_rx,
            metrics,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Binds the listening socket. A failure here is scoped to this
    /// frontend; the caller decides whether to register it.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .with_context(|| {
                format!(
                    "Failed to bind frontend for {} on port {}",
                    self.app_id, self.port
                )
            })?;
        info!(
            "Started frontend for {} at {}",
            self.app_id,
            listener.local_addr()?
        );
        Ok(listener)
    }

    /// Accept loop. Each accepted connection is handed to an independent
    /// proxy task immediately, so acceptance never blocks on proxying.
    /// Exits when `stop()` fires or the listener fails; either way the
    /// outcome is confined to this frontend, and the returned `ServeExit`
    /// tells the owner which of the two it was.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> ServeExit {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Stopped frontend for {}", self.app_id);
                    return ServeExit::Stopped;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            self.metrics.record_connection(&self.app_id);
                            match self.lookup().await {
                                Ok(backend) => {
                                    let request = ProxyRequest::new(backend, self.app_id.clone());
                                    let metrics = self.metrics.clone();
                                    tokio::spawn(request.run(socket, metrics));
                                }
                                Err(StrategyError::NoAvailableBackends) => {
                                    warn!(
                                        "No available backends for {}, dropping connection from {}",
                                        self.app_id, peer
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            error!("Accept failed for frontend {}: {}", self.app_id, e);
                            return ServeExit::Failed;
                        }
                    }
                }
            }
        }
    }

    /// Picks the backend for the next connection. Constant time; safe to
    /// call concurrently with `add_backend`/`remove_backend`.
    pub async fn lookup(&self) -> Result<String, StrategyError> {
        self.state.lock().await.strategy.next()
    }

    pub async fn add_backend(&self, endpoint: &str) {
        let mut state = self.state.lock().await;
        if !state.backends.insert(endpoint.to_string()) {
            debug!(
                "Backend {} is already part of frontend {}",
                endpoint, self.app_id
            );
            return;
        }
        state.strategy.add_backend(endpoint);
        self.metrics.set_backend_count(&self.app_id, state.backends.len());
        info!("Added backend {} to frontend {}", endpoint, self.app_id);
    }

    pub async fn remove_backend(&self, endpoint: &str) {
        let mut state = self.state.lock().await;
        if !state.backends.remove(endpoint) {
            warn!(
                "Backend {} is not part of this frontend - {}",
                endpoint, self.app_id
            );
            return;
        }
        state.strategy.remove_backend(endpoint);
        self.metrics.set_backend_count(&self.app_id, state.backends.len());
        info!("Removed backend {} from frontend {}", endpoint, self.app_id);
    }

    /// Current backend membership count.
    pub async fn size(&self) -> usize {
        self.state.lock().await.backends.len()
    }

    /// Stops accepting new connections. In-flight proxied connections are
    /// left alone; they finish on their own streams.
    pub fn stop(&self) {
        info!("Stopping the frontend - {}", self.app_id);
        if self.shutdown_tx.send(true).is_err() {
            debug!("Frontend {} accept loop already gone", self.app_id);
        }
    }
}
