//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): executed calls by operation, outcome
//! - `dispatch_duration_seconds` (histogram): handler execution time
//! - `dispatch_short_circuit_total` (counter): pre-handled calls by host
//! - `dispatch_hook_failures_total` (counter): uncaught-exception hook failures
//! - `listener_active_connections` (gauge): open listener connections

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::http::HostKind;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record a finished call. `outcome` is `completed`, `handled_fault` or `faulted`.
pub fn record_dispatch(operation: &str, outcome: &'static str, start: Instant) {
    counter!(
        "dispatch_requests_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("dispatch_duration_seconds", "operation" => operation.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_short_circuit(host: HostKind) {
    counter!("dispatch_short_circuit_total", "host" => host.environment()).increment(1);
}

pub fn record_hook_failure(operation: &str) {
    counter!("dispatch_hook_failures_total", "operation" => operation.to_string()).increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("listener_active_connections").set(count as f64);
}
