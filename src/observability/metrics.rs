//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define invocation metrics (throughput, latency, failures)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `api_invocations_total` (counter): invocations by route, outcome
//! - `api_invocation_duration_seconds` (histogram): latency by route
//! - `api_long_running_total` (counter): invocations over the threshold, by route
//! - `api_route_resolutions_total` (counter): resolutions by result
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed (tests, embedded use)
//! - Labels are route keys, never raw paths, to bound cardinality

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Outcome label for `api_invocations_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Success,
    /// Failed, but an exception mapper produced the response.
    Mapped,
    Error,
    Aborted,
}

impl InvocationOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            InvocationOutcome::Success => "success",
            InvocationOutcome::Mapped => "mapped",
            InvocationOutcome::Error => "error",
            InvocationOutcome::Aborted => "aborted",
        }
    }
}

pub fn record_invocation(route: &str, outcome: InvocationOutcome) {
    metrics::counter!(
        "api_invocations_total",
        "route" => route.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_duration(route: &str, elapsed: Duration) {
    metrics::histogram!("api_invocation_duration_seconds", "route" => route.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_long_running(route: &str) {
    metrics::counter!("api_long_running_total", "route" => route.to_string()).increment(1);
}

/// `result` is one of `matched`, `not_found`, `ambiguous`.
pub fn record_resolution(result: &'static str) {
    metrics::counter!("api_route_resolutions_total", "result" => result).increment(1);
}
