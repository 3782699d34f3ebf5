//! Prometheus metrics for Portcullis.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `portcullis_requests_total` | Counter | `route`, `status` | Requests served |
//! | `portcullis_request_duration_seconds` | Histogram | `route` | Request latency |
//! | `portcullis_in_flight_requests` | Gauge | - | Requests being processed |
//! | `portcullis_not_found_total` | Counter | - | Requests with no matching route |
//! | `portcullis_gate_denials_total` | Counter | `gate` | Requests rejected by an access gate |
//! | `portcullis_recovered_panics_total` | Counter | - | Handler faults turned into a 500 |
//!
//! Recording is always safe: without an installed recorder the calls are
//! no-ops. [`init_metrics`] installs the Prometheus recorder and keeps its
//! handle so the host can render `/metrics`.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Route label used when no route matched.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Path the host serves the Prometheus text format on.
    pub path: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the global Prometheus recorder.
///
/// Calling it twice fails; the first handle stays in place.
///
/// # Errors
///
/// Returns [`TelemetryError::MetricsInit`] if the buckets are invalid or a
/// recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&config.duration_buckets)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if [`init_metrics`] has not run.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!("portcullis_requests_total", "Total number of HTTP requests served");
    describe_histogram!(
        "portcullis_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "portcullis_in_flight_requests",
        "Number of HTTP requests currently being processed"
    );
    describe_counter!(
        "portcullis_not_found_total",
        "Requests that matched no route"
    );
    describe_counter!(
        "portcullis_gate_denials_total",
        "Requests rejected by an access gate"
    );
    describe_counter!(
        "portcullis_recovered_panics_total",
        "Handler faults converted into a 500 response"
    );
}

/// Records a completed request.
///
/// `route` is the matched pattern, or [`UNMATCHED_ROUTE`]. Using the
/// pattern rather than the path keeps label cardinality bounded.
pub fn record_request(route: &str, status_code: u16, duration: Duration) {
    counter!(
        "portcullis_requests_total",
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "portcullis_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a request that matched no route.
pub fn record_not_found() {
    counter!("portcullis_not_found_total").increment(1);
}

/// Records a rejection by the named gate.
pub fn record_gate_denial(gate: &'static str) {
    counter!("portcullis_gate_denials_total", "gate" => gate).increment(1);
}

/// Records a handler fault that was recovered.
pub fn record_recovered_panic() {
    counter!("portcullis_recovered_panics_total").increment(1);
}

/// Tracks one in-flight request; the gauge drops again when this does.
#[derive(Debug)]
#[must_use = "the request stops counting as in flight when the guard drops"]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the in-flight gauge.
    pub fn new() -> Self {
        gauge!("portcullis_in_flight_requests").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("portcullis_in_flight_requests").decrement(1.0);
    }
}
