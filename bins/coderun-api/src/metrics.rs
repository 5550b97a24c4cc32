// Prometheus metrics for the coderun API

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Once;

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Executions finished (language and outcome labels)
    pub static ref EXECUTIONS: CounterVec = CounterVec::new(
        Opts::new("coderun_executions_total", "Total number of finished executions"),
        &["language", "outcome"]
    )
    .expect("metric can be created");

    // Execution wall time histogram (in milliseconds)
    pub static ref EXECUTION_TIME: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "coderun_execution_time_ms",
            "Execution wall time in milliseconds"
        )
        .buckets(vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]),
        &["language"]
    )
    .expect("metric can be created");

    // Requests turned away before execution
    pub static ref REQUESTS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("coderun_requests_rejected_total", "Total requests rejected before execution"),
        &["reason"]
    )
    .expect("metric can be created");

    // Accepted execute requests not yet answered, queued ones included
    pub static ref IN_FLIGHT: IntGauge = IntGauge::new(
        "coderun_in_flight",
        "Execute requests being handled, including those waiting for a slot"
    )
    .expect("metric can be created");

    // Execution slots held, refreshed on every scrape
    pub static ref SLOTS_BUSY: IntGauge = IntGauge::new(
        "coderun_slots_busy",
        "Execution slots currently held by running executions"
    )
    .expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(EXECUTIONS.clone()),
            Box::new(EXECUTION_TIME.clone()),
            Box::new(REQUESTS_REJECTED.clone()),
            Box::new(IN_FLIGHT.clone()),
            Box::new(SLOTS_BUSY.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::error!("Failed to register collector: {}", e);
            }
        }
    });
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record a finished execution
pub fn record_execution(language: &str, outcome: &str, execution_time_ms: f64) {
    EXECUTIONS.with_label_values(&[language, outcome]).inc();
    EXECUTION_TIME
        .with_label_values(&[language])
        .observe(execution_time_ms);
}

/// Mirror the admission state into the slots gauge
pub fn record_slots_busy(busy: usize) {
    SLOTS_BUSY.set(busy as i64);
}

/// Record a request rejected before execution
pub fn record_rejected(reason: &str) {
    REQUESTS_REJECTED.with_label_values(&[reason]).inc();
}

/// Keeps the in-flight gauge raised for its lifetime
pub struct InFlight;

impl InFlight {
    pub fn enter() -> Self {
        IN_FLIGHT.inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.dec();
    }
}
