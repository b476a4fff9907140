//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec, Encoder,
    HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording application metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records the outcome of the initial session existence check.
    fn record_session_init(&self, result: &str);

    /// Records an auth event seen by the session store and whether it changed the state.
    fn record_session_event(&self, event: &str, applied: bool);

    /// Records a route guard decision.
    fn record_guard_decision(&self, mode: &str, outcome: &str);

    /// Records an auth gateway operation (login, register, ...).
    fn record_auth_operation(&self, operation: &str, result: &str);

    /// Records one dashboard sub-query with its outcome.
    fn record_dashboard_query(&self, query: &str, result: &str);

    /// Records the duration of one dashboard sub-query.
    fn record_dashboard_duration(&self, query: &str, duration_secs: f64);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Session metrics
    session_initializations_total: CounterVec,
    session_events_total: CounterVec,

    // Routing and auth
    guard_decisions_total: CounterVec,
    auth_operations_total: CounterVec,

    // Dashboard metrics
    dashboard_queries_total: CounterVec,
    dashboard_query_duration_seconds: HistogramVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let session_initializations_total = register_counter_vec_with_registry!(
            Opts::new(
                "session_initializations_total",
                "Initial session existence checks by result"
            ),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register session_initializations_total");

        let session_events_total = register_counter_vec_with_registry!(
            Opts::new(
                "session_events_total",
                "Auth state change events received by the session store"
            ),
            &["event", "applied"],
            registry.clone()
        )
        .expect("Failed to register session_events_total");

        let guard_decisions_total = register_counter_vec_with_registry!(
            Opts::new("guard_decisions_total", "Route guard decisions"),
            &["mode", "outcome"],
            registry.clone()
        )
        .expect("Failed to register guard_decisions_total");

        let auth_operations_total = register_counter_vec_with_registry!(
            Opts::new("auth_operations_total", "Auth gateway operations"),
            &["operation", "result"],
            registry.clone()
        )
        .expect("Failed to register auth_operations_total");

        let dashboard_queries_total = register_counter_vec_with_registry!(
            Opts::new("dashboard_queries_total", "Dashboard sub-queries by result"),
            &["query", "result"],
            registry.clone()
        )
        .expect("Failed to register dashboard_queries_total");

        let dashboard_query_duration_seconds = register_histogram_vec_with_registry!(
            "dashboard_query_duration_seconds",
            "Dashboard sub-query duration in seconds",
            &["query"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register dashboard_query_duration_seconds");

        Metrics {
            registry,
            session_initializations_total,
            session_events_total,
            guard_decisions_total,
            auth_operations_total,
            dashboard_queries_total,
            dashboard_query_duration_seconds,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("Failed to encode metrics");
        String::from_utf8(buffer).expect("Metrics encoding produced invalid UTF-8")
    }
}

impl MetricsRecorder for Metrics {
    fn record_session_init(&self, result: &str) {
        self.session_initializations_total
            .with_label_values(&[result])
            .inc();
    }

    fn record_session_event(&self, event: &str, applied: bool) {
        let applied = if applied { "true" } else { "false" };
        self.session_events_total
            .with_label_values(&[event, applied])
            .inc();
    }

    fn record_guard_decision(&self, mode: &str, outcome: &str) {
        self.guard_decisions_total
            .with_label_values(&[mode, outcome])
            .inc();
    }

    fn record_auth_operation(&self, operation: &str, result: &str) {
        self.auth_operations_total
            .with_label_values(&[operation, result])
            .inc();
    }

    fn record_dashboard_query(&self, query: &str, result: &str) {
        self.dashboard_queries_total
            .with_label_values(&[query, result])
            .inc();
    }

    fn record_dashboard_duration(&self, query: &str, duration_secs: f64) {
        self.dashboard_query_duration_seconds
            .with_label_values(&[query])
            .observe(duration_secs);
    }
}
