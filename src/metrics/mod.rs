use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - HTTP traffic (request counts and latency per route)
// - Order lifecycle (creations, status transitions)
// - Failed operations by error kind
// - Store connectivity as seen by the health check
//
// All metrics are registered with one Registry and scraped via /metrics.
// Recording never fails and never affects request handling.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // HTTP Metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,

    // Order Lifecycle Metrics
    pub orders_created: IntCounter,
    pub status_transitions: IntCounterVec,
    pub operation_failures: IntCounterVec,

    // Store Metrics
    pub store_up: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // HTTP Metrics
        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["method", "route"],
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        // Order Lifecycle Metrics
        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new(
                "order_status_transitions_total",
                "Order status transitions applied",
            ),
            &["from", "to"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let operation_failures = IntCounterVec::new(
            Opts::new(
                "order_operation_failures_total",
                "Order operations that failed, by error kind",
            ),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(operation_failures.clone()))?;

        // Store Metrics
        let store_up = IntGauge::new(
            "order_store_up",
            "Order store connectivity at last health check (0=down, 1=up)",
        )?;
        registry.register(Box::new(store_up.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            orders_created,
            status_transitions,
            operation_failures,
            store_up,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, route])
            .observe(duration_secs);
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.status_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_failure(&self, operation: &str, kind: &str) {
        self.operation_failures.with_label_values(&[operation, kind]).inc();
    }

    pub fn set_store_up(&self, up: bool) {
        self.store_up.set(i64::from(up));
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
