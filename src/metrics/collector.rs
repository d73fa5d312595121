// src/metrics/collector.rs
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;
use anyhow::Result;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        buffer
    }
}

/// Created once at process start and passed into the Manager, every
/// Frontend, and every connection proxy. Never reinitialized.
pub struct MetricsCollector {
    // Frontend metrics
    pub frontend_connections_total: IntCounterVec,
    pub request_latency_seconds: HistogramVec,
    pub frontend_backends: IntGaugeVec,

    // Proxy metrics
    pub proxy_errors_total: IntCounterVec,

    // System metrics
    pub active_frontends: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let frontend_connections_total = IntCounterVec::new(
            Opts::new(
                "tcplb_frontend_connections_total",
                "Total connections accepted per frontend",
            ),
            &["app"],
        )?;
        registry.register(Box::new(frontend_connections_total.clone()))?;

        let request_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tcplb_request_latency_seconds",
                "Lifetime of a proxied connection in seconds",
            ),
            &["app"],
        )?;
        registry.register(Box::new(request_latency_seconds.clone()))?;

        let frontend_backends = IntGaugeVec::new(
            Opts::new(
                "tcplb_frontend_backends",
                "Current backend membership per frontend",
            ),
            &["app"],
        )?;
        registry.register(Box::new(frontend_backends.clone()))?;

        let proxy_errors_total = IntCounterVec::new(
            Opts::new(
                "tcplb_proxy_errors_total",
                "Per-connection proxy failures",
            ),
            &["app", "kind"],
        )?;
        registry.register(Box::new(proxy_errors_total.clone()))?;

        let active_frontends =
            IntGauge::new("tcplb_active_frontends", "Number of running frontends")?;
        registry.register(Box::new(active_frontends.clone()))?;

        Ok(Self {
            frontend_connections_total,
            request_latency_seconds,
            frontend_backends,
            proxy_errors_total,
            active_frontends,
        })
    }

    pub fn record_connection(&self, app: &str) {
        self.frontend_connections_total
            .with_label_values(&[app])
            .inc();
    }

    pub fn observe_request_latency(&self, app: &str, duration: std::time::Duration) {
        self.request_latency_seconds
            .with_label_values(&[app])
            .observe(duration.as_secs_f64());
    }

    pub fn record_proxy_error(&self, app: &str, kind: &str) {
        self.proxy_errors_total
            .with_label_values(&[app, kind])
            .inc();
    }

    pub fn frontend_started(&self) {
        self.active_frontends.inc();
    }

    pub fn frontend_stopped(&self) {
        self.active_frontends.dec();
    }

    pub fn set_backend_count(&self, app: &str, count: usize) {
        self.frontend_backends
            .with_label_values(&[app])
            .set(count as i64);
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
