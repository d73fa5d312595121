// src/strategy/round_robin.rs
use std::collections::{HashSet, VecDeque};

use crate::strategy::{LoadBalancingStrategy, StrategyError};

/// Cyclic selection over the backends in insertion order.
///
/// Removal is lazy: the endpoint is tombstoned and physically dropped the
/// next time it reaches the head of the queue, so removing a backend never
/// scans the queue or disturbs the cyclic position of the survivors.
pub struct RoundRobinStrategy {
    queue: VecDeque<String>,
    removed: HashSet<String>,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            removed: HashSet::new(),
        }
    }
}

impl Default for RoundRobinStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancingStrategy for RoundRobinStrategy {
    fn next(&mut self) -> Result<String, StrategyError> {
        // Every iteration either returns or permanently shrinks the queue,
        // so this terminates even when every entry has been tombstoned.
        while let Some(endpoint) = self.queue.pop_front() {
            if self.removed.remove(&endpoint) {
                continue;
            }
            self.queue.push_back(endpoint.clone());
            return Ok(endpoint);
        }
        Err(StrategyError::NoAvailableBackends)
    }

    fn add_backend(&mut self, endpoint: &str) {
        self.queue.push_back(endpoint.to_string());
    }

    fn remove_backend(&mut self, endpoint: &str) {
        // Accepted silently for endpoints we do not track; a single removal
        // cancels at most one pending skip.
        self.removed.insert(endpoint.to_string());
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
