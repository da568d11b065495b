//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch and container metrics
//! - Expose a Prometheus-compatible metrics endpoint when configured
//!
//! # Metrics
//! - `webwire_requests_total` (counter): requests by method, status, route pattern
//! - `webwire_request_duration_seconds` (histogram): dispatch latency
//! - `webwire_beans_created_total` (counter): singletons constructed
//! - `webwire_security_rejections_total` (counter): 401/403 by status
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Route label is the pattern, not the raw path, to bound cardinality
//! - Without an installed recorder every update is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("route", route.to_string()),
    ];
    metrics::counter!("webwire_requests_total", &labels).increment(1);
    metrics::histogram!("webwire_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}
