//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pipeline_attempts_total` (counter): handler invocations, first attempts included
//! - `pipeline_retries_total` (counter): attempts repeated after a retryable error
//! - `pipeline_outcomes_total` (counter): finished requests by outcome
//!   (`succeeded`, `exhausted`, `failed`)
//! - `pipeline_body_spills_total` (counter): request bodies buffered on disk
//! - `http_requests_total` (counter): HTTP responses by status

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt() {
    counter!("pipeline_attempts_total").increment(1);
}

pub fn record_retry() {
    counter!("pipeline_retries_total").increment(1);
}

pub fn record_outcome(outcome: &'static str) {
    counter!("pipeline_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_body_spill() {
    counter!("pipeline_body_spills_total").increment(1);
}

pub fn record_http_response(status: u16) {
    counter!("http_requests_total", "status" => status.to_string()).increment(1);
}
