// src/config/labels.rs
use std::collections::HashMap;

use crate::strategy::StrategyKind;

/// Label denoting whether TCP load balancing is wanted for an app.
/// Default - false.
pub const LB_ENABLED: &str = "lb.enabled";

/// Label denoting the frontend port at which the app is exposed.
/// Mandatory when `lb.enabled` is truthy.
pub const LB_PORT: &str = "lb.port";

/// Label denoting the zero-based index of the backend instance port to
/// balance. Useful when an app exposes multiple ports. Default - 0.
/// Consumed by the Provider, not the Manager.
pub const LB_PORT_INDEX: &str = "lb.portIndex";

/// Label selecting the balancing strategy. Default - round-robin.
pub const LB_STRATEGY: &str = "lb.strategy";

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("label {LB_PORT} is mandatory when {LB_ENABLED} is set")]
    MissingPort,
    #[error("label {LB_PORT} has an invalid value: {0}")]
    InvalidPort(String),
}

/// What the labels ask us to run for an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontendSpec {
    pub port: u16,
    pub strategy: StrategyKind,
}

/// Reads the frontend-facing labels of an app. `Ok(None)` means load
/// balancing is not enabled; an enabled app without a usable port is a
/// configuration error.
pub fn frontend_spec(labels: &HashMap<String, String>) -> Result<Option<FrontendSpec>, LabelError> {
    if !truthy(labels.get(LB_ENABLED)) {
        return Ok(None);
    }

    let port = match labels.get(LB_PORT) {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| LabelError::InvalidPort(raw.clone()))?,
        None => return Err(LabelError::MissingPort),
    };

    let strategy = match labels.get(LB_STRATEGY) {
        Some(raw) => StrategyKind::parse(raw).unwrap_or_else(|| {
            tracing::warn!("Unknown strategy label {:?}, using round robin", raw);
            StrategyKind::RoundRobin
        }),
        None => StrategyKind::RoundRobin,
    };

    Ok(Some(FrontendSpec { port, strategy }))
}

/// Zero-based index of the backend instance port to use. Invalid values
/// fall back to the default.
pub fn port_index(labels: &HashMap<String, String>) -> usize {
    match labels.get(LB_PORT_INDEX) {
        Some(raw) => raw.parse::<usize>().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using 0", LB_PORT_INDEX, raw);
            0
        }),
        None => 0,
    }
}

fn truthy(value: Option<&String>) -> bool {
    match value {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "t" | "true"),
        None => false,
    }
}
