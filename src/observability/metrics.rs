//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_submissions_total` (counter): requests written by the front role
//! - `relay_responses_total` (counter): responses delivered, by outcome
//! - `relay_timeouts_total` (counter): waits that hit the deadline
//! - `relay_target_attempts_total` (counter): target calls, by result
//! - `relay_malformed_records_total` (counter): unreadable request or response records
//! - `relay_swept_files_total` (counter): sweeper removals, by kind
//! - `relay_inflight_executions` (gauge): target calls currently running
//! - `relay_exchange_duration_seconds` (histogram): submit-to-delivery latency
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus metrics exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    if let Err(e) = builder.install() {
        tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter");
    } else {
        tracing::info!(address = %addr, "Metrics exporter listening");
    }
}

pub fn record_submission() {
    counter!("relay_submissions_total").increment(1);
}

/// `outcome` is `delivered`, or `synthetic` when the relay made the response up.
pub fn record_response(outcome: &'static str, elapsed: Duration) {
    counter!("relay_responses_total", "outcome" => outcome).increment(1);
    histogram!("relay_exchange_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_timeout() {
    counter!("relay_timeouts_total").increment(1);
}

pub fn record_target_attempt(result: &'static str) {
    counter!("relay_target_attempts_total", "result" => result).increment(1);
}

pub fn record_malformed() {
    counter!("relay_malformed_records_total").increment(1);
}

pub fn record_swept(kind: &'static str) {
    counter!("relay_swept_files_total", "kind" => kind).increment(1);
}

pub fn set_inflight(count: usize) {
    gauge!("relay_inflight_executions").set(count as f64);
}
