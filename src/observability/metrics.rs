//! Metrics collection and exposition.
//!
//! # Metrics
//! - `faultline_apply_attempts_total` (counter): apply attempts by terminal stage
//! - `faultline_apply_duration_seconds` (histogram): wall time of an apply attempt
//! - `faultline_rollbacks_total` (counter): rollbacks by kind (automatic, manual) and outcome
//! - `faultline_service_restarts_total` (counter): restarts by service and outcome
//! - `faultline_reload_signals_total` (counter): reload calls by outcome
//! - `faultline_stack_healthy` (gauge): 1=healthy, 0=unhealthy after the last check

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_apply(stage: &'static str, started: Instant) {
    metrics::counter!("faultline_apply_attempts_total", "stage" => stage).increment(1);
    metrics::histogram!("faultline_apply_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_rollback(kind: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    metrics::counter!("faultline_rollbacks_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}

pub fn record_restart(service: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    metrics::counter!(
        "faultline_service_restarts_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_reload(ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    metrics::counter!("faultline_reload_signals_total", "outcome" => outcome).increment(1);
}

pub fn record_stack_health(healthy: bool) {
    metrics::gauge!("faultline_stack_healthy").set(if healthy { 1.0 } else { 0.0 });
}
