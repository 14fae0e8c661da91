//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, worker
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `balancer_selections_total` (counter): selections by balancer, worker
//! - `balancer_no_candidate_total` (counter): selections that found no worker
//! - `balancer_probes_total` (counter): recovery probes by worker, result
//! - `balancer_recoveries_total` (counter): workers returned to service
//! - `balancer_worker_busy` (gauge): active requests per worker
//!
//! Recording without an installed exporter is a no-op, so tests and
//! library users pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, worker: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("worker", worker.to_string()),
    ];
    metrics::counter!("proxy_requests_total", &labels).increment(1);
    metrics::histogram!("proxy_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_selection(balancer: &str, worker: &str) {
    metrics::counter!(
        "balancer_selections_total",
        "balancer" => balancer.to_string(),
        "worker" => worker.to_string()
    )
    .increment(1);
}

pub fn record_no_candidate(balancer: &str) {
    metrics::counter!("balancer_no_candidate_total", "balancer" => balancer.to_string()).increment(1);
}

pub fn record_probe(worker: &str, healthy: bool) {
    let result = if healthy { "healthy" } else { "unhealthy" };
    metrics::counter!(
        "balancer_probes_total",
        "worker" => worker.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_recovery(worker: &str) {
    metrics::counter!("balancer_recoveries_total", "worker" => worker.to_string()).increment(1);
}

pub fn record_busy(worker: &str, busy: usize) {
    metrics::gauge!("balancer_worker_busy", "worker" => worker.to_string()).set(busy as f64);
}
