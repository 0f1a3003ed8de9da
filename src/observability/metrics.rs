//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define portal metrics (requests, storage operations, tokens)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `portal_http_requests_total` (counter): requests by method, path, status
//! - `portal_http_request_duration_seconds` (histogram): latency by method, path
//! - `portal_storage_operations_total` (counter): blob operations by outcome
//! - `portal_tokens_acquired_total` (counter): tokens by credential source
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Paths are recorded as matched route templates, never raw URLs, to
//!   keep label cardinality bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// A portal that cannot bind the metrics port still serves traffic; the
/// failure is logged and recording becomes a no-op.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(addr = %addr, "Metrics endpoint listening");
        }
        Err(e) => {
            tracing::warn!(addr = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

/// Record one handled HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, started: Instant) {
    counter!(
        "portal_http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);

    histogram!(
        "portal_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
    )
    .record(started.elapsed().as_secs_f64());
}

/// Record the outcome of one blob service operation.
pub fn record_storage_operation(operation: &'static str, ok: bool) {
    counter!(
        "portal_storage_operations_total",
        "operation" => operation,
        "outcome" => if ok { "ok" } else { "error" },
    )
    .increment(1);
}

/// Record a token acquisition by credential source.
pub fn record_token_acquired(source: &str) {
    counter!(
        "portal_tokens_acquired_total",
        "source" => source.to_string(),
    )
    .increment(1);
}
