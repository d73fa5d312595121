// src/provider/mod.rs
mod static_file;

pub use static_file::StaticFileProvider;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};

/// Information related to an app, as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub app_id: String,
    pub labels: HashMap<String, String>,
}

/// A backend instance of an app becoming available or unavailable.
/// `endpoint` is formatted `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub app_id: String,
    pub endpoint: String,
}

/// One discovery event. Delivered over a single ordered channel so the
/// Manager processes exactly one event at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A new app has been deployed, or an existing one updated.
    AppUpdated(AppInfo),
    /// An existing app has been destroyed; its frontend can go.
    AppDestroyed(AppInfo),
    /// A backend instance of an app came up.
    BackendAdded(BackendInfo),
    /// A backend instance of an app went away.
    BackendRemoved(BackendInfo),
}

/// A source of discovery events: Marathon, Consul, a static file, etc.
///
/// `provide` must start emitting events asynchronously and return
/// immediately; a setup error is fatal to the caller. The provider keeps
/// the event sender alive until the stop signal fires.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn provide(
        &self,
        events: mpsc::Sender<DiscoveryEvent>,
        stop: watch::Receiver<bool>,
    ) -> Result<()>;
}
