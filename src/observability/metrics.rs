//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define breaker metrics (probes, short-circuits, state, failures)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-service series
//!
//! # Metrics
//! - `breaker_probes_total` (counter): probes by service, result
//! - `breaker_probe_duration_seconds` (histogram): probe latency
//! - `breaker_short_circuits_total` (counter): checks skipped by an open circuit
//! - `breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `breaker_consecutive_failures` (gauge)
//! - `monitor_sweeps_total` (counter): completed scheduled sweeps
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels for service and result only; cardinality is bounded by config

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_probe(service: &str, result: &'static str, elapsed: Duration) {
    counter!("breaker_probes_total", "service" => service.to_string(), "result" => result)
        .increment(1);
    histogram!("breaker_probe_duration_seconds", "service" => service.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_short_circuit(service: &str) {
    counter!("breaker_short_circuits_total", "service" => service.to_string()).increment(1);
}

pub fn record_breaker_state(service: &str, state: CircuitState, consecutive_failures: u32) {
    gauge!("breaker_state", "service" => service.to_string()).set(state as u8 as f64);
    gauge!("breaker_consecutive_failures", "service" => service.to_string())
        .set(consecutive_failures as f64);
}

pub fn record_sweep(unavailable: usize) {
    counter!("monitor_sweeps_total").increment(1);
    gauge!("monitor_unavailable_services").set(unavailable as f64);
}
