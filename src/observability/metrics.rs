//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define watchdog metrics (probes, failures, heals, notifications)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `watchdog_probes_total` (counter): probes by outcome
//! - `watchdog_probe_duration_seconds` (histogram): probe latency
//! - `watchdog_consecutive_failures` (gauge): current failure run
//! - `watchdog_bridge_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `watchdog_synced_fraction` (gauge): share of fresh accounts
//! - `watchdog_heal_dispatches_total` (counter): dispatched/failed/skipped
//! - `watchdog_recoveries_total` (counter): recovered/unrecovered
//! - `watchdog_notifications_total` (counter): by kind and outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are low-cardinality static strings

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(healthy: bool, synced_fraction: f64, start: Instant) {
    let outcome = if healthy { "healthy" } else { "unhealthy" };
    counter!("watchdog_probes_total", "outcome" => outcome).increment(1);
    histogram!("watchdog_probe_duration_seconds").record(start.elapsed().as_secs_f64());
    gauge!("watchdog_bridge_healthy").set(if healthy { 1.0 } else { 0.0 });
    gauge!("watchdog_synced_fraction").set(synced_fraction);
}

pub fn record_consecutive_failures(count: u32) {
    gauge!("watchdog_consecutive_failures").set(count as f64);
}

pub fn record_heal_dispatch(outcome: &'static str) {
    counter!("watchdog_heal_dispatches_total", "outcome" => outcome).increment(1);
}

pub fn record_recovery(succeeded: bool) {
    let outcome = if succeeded { "recovered" } else { "unrecovered" };
    counter!("watchdog_recoveries_total", "outcome" => outcome).increment(1);
}

pub fn record_notification(kind: &'static str, outcome: &'static str) {
    counter!("watchdog_notifications_total", "kind" => kind, "outcome" => outcome).increment(1);
}
