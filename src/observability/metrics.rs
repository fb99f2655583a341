//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_selections_total` (counter): selections by strategy, backend
//! - `balancer_no_backends_total` (counter): selections against an empty registry
//! - `balancer_backend_outstanding` (gauge): requests in flight per backend
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::load_balancer::backend::BackendId;

/// Install the Prometheus recorder and its HTTP listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_selection(strategy: &'static str, backend: &BackendId) {
    counter!(
        "balancer_selections_total",
        "strategy" => strategy,
        "backend" => backend.to_string()
    )
    .increment(1);
}

pub fn record_no_backends(strategy: &'static str) {
    counter!("balancer_no_backends_total", "strategy" => strategy).increment(1);
}

pub fn set_outstanding(backend: &BackendId, outstanding: usize) {
    gauge!("balancer_backend_outstanding", "backend" => backend.to_string()).set(outstanding as f64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
