// src/proxy/request.rs
use std::sync::Arc;
use tokio::io;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::{MetricsCollector, Timer};

// Custom error type for proxy operations
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("cannot connect to upstream {endpoint}: {source}")]
    Dial {
        endpoint: String,
        source: io::Error,
    },

    #[error("relay failed ({direction}): {source}")]
    Relay {
        direction: &'static str,
        source: io::Error,
    },
}

impl ProxyError {
    fn kind(&self) -> &'static str {
        match self {
            ProxyError::Dial { .. } => "dial",
            ProxyError::Relay { .. } => "relay",
        }
    }
}

/// Relays one accepted client connection to one chosen backend, byte for
/// byte, in both directions, until either stream ends.
pub struct ProxyRequest {
    backend: String,
    app_id: String,
    conn_id: Uuid,
}

impl ProxyRequest {
    pub fn new(backend: String, app_id: String) -> Self {
        Self {
            backend,
            app_id,
            conn_id: Uuid::new_v4(),
        }
    }

    /// Runs the proxy to completion, timing the connection's lifetime and
    /// logging failures. Errors never escalate past this point; they only
    /// ever concern this one connection.
    pub async fn run(self, client: TcpStream, metrics: Arc<MetricsCollector>) {
        let timer = Timer::new();
        let app_id = self.app_id.clone();
        let conn_id = self.conn_id;

        if let Err(e) = self.accept(client).await {
            metrics.record_proxy_error(&app_id, e.kind());
            warn!(%conn_id, app = %app_id, "proxy error: {}", e);
        }
        metrics.observe_request_latency(&app_id, timer.elapsed());
    }

    /// Dials the backend and splices the two streams. Completes when the
    /// first relay direction finishes; the other direction is then torn
    /// down and drained, and both sockets close by drop on every path.
    async fn accept(self, client: TcpStream) -> Result<(), ProxyError> {
        let backend = TcpStream::connect(&self.backend)
            .await
            .map_err(|source| ProxyError::Dial {
                endpoint: self.backend.clone(),
                source,
            })?;
        debug!(conn_id = %self.conn_id, app = %self.app_id, backend = %self.backend, "proxying connection");

        let (client_read, client_write) = client.into_split();
        let (backend_read, backend_write) = backend.into_split();

        // Capacity 2 so neither relay ever blocks reporting its outcome.
        let (tx, mut rx) = mpsc::channel::<(&'static str, io::Result<u64>)>(2);

        let upstream = tokio::spawn(relay(client_read, backend_write, tx.clone(), "client->backend"));
        let downstream = tokio::spawn(relay(backend_read, client_write, tx, "backend->client"));

        // First outcome wins: a clean end of stream on either side ends the
        // whole connection. The losing direction is aborted and awaited so
        // its halves are dropped (closing both sockets) and no relay task
        // outlives the connection.
        let first = rx.recv().await;
        upstream.abort();
        downstream.abort();
        let _ = upstream.await;
        let _ = downstream.await;

        match first {
            Some((direction, Err(source))) => Err(ProxyError::Relay { direction, source }),
            _ => Ok(()),
        }
    }
}

async fn relay(
    mut src: OwnedReadHalf,
    mut dst: OwnedWriteHalf,
    outcomes: mpsc::Sender<(&'static str, io::Result<u64>)>,
    direction: &'static str,
) {
    let result = io::copy(&mut src, &mut dst).await;
    let _ = outcomes.send((direction, result)).await;
}
