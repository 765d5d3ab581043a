//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method, status, handler
//! - `dispatch_request_duration_seconds` (histogram): latency distribution
//! - `dispatch_spans_finished_total` (counter): finished spans by sampling decision
//! - `dispatch_middleware_errors_total` (counter): chain failures by kind
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, handler: &str, start: Instant) {
    let (method, status, handler) = (method.to_string(), status.to_string(), handler.to_string());
    counter!(
        "dispatch_requests_total",
        "method" => method.clone(),
        "status" => status.clone(),
        "handler" => handler.clone()
    )
    .increment(1);
    histogram!(
        "dispatch_request_duration_seconds",
        "method" => method,
        "status" => status,
        "handler" => handler
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_span_finished(sampled: bool) {
    counter!("dispatch_spans_finished_total", "sampled" => sampled.to_string()).increment(1);
}

pub fn record_middleware_error(kind: &str) {
    counter!("dispatch_middleware_errors_total", "kind" => kind.to_string()).increment(1);
}
