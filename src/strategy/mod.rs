// src/strategy/mod.rs
mod round_robin;

pub use round_robin::RoundRobinStrategy;

/// The algorithm used to pick a backend for the next connection.
/// General examples would be round-robin / least-connection etc.
///
/// `add_backend` / `remove_backend` exist to keep up with the Provider:
/// some strategies need the set of backends plus metadata about them to
/// answer `next()`.
pub trait LoadBalancingStrategy: Send {
    /// Returns the backend the next connection should be routed to.
    fn next(&mut self) -> Result<String, StrategyError>;

    /// Tracks a backend for selection.
    fn add_backend(&mut self, endpoint: &str);

    /// Stops selecting a specific backend.
    fn remove_backend(&mut self, endpoint: &str);

    fn name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("no available backends")]
    NoAvailableBackends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    RoundRobin,
    LeastConnection,
}

impl StrategyKind {
    /// Parses a strategy label value. Unknown names map to `None` so the
    /// caller can decide how to fall back.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "round-robin" | "round_robin" => Some(StrategyKind::RoundRobin),
            "least-connection" | "least_connection" => Some(StrategyKind::LeastConnection),
            _ => None,
        }
    }
}

pub fn create_strategy(kind: StrategyKind) -> Box<dyn LoadBalancingStrategy> {
    match kind {
        StrategyKind::RoundRobin => Box::new(RoundRobinStrategy::new()),
        other => {
            tracing::warn!(
                "Unsupported load balancing strategy {:?}, falling back to round robin",
                other
            );
            Box::new(RoundRobinStrategy::new())
        }
    }
}
