//! Metrics collection and exposition.
//!
//! # Metrics
//! - `route_cache_lookups_total` (counter): lookups by kind, outcome
//! - `route_cache_stores_total` (counter): stored entries by kind
//! - `route_cache_backend_errors_total` (counter): degraded backend calls by op
//! - `route_cache_clears_total` (counter): full flushes
//! - `route_cache_entries` (gauge): entries held by the in-memory store
//!
//! # Design Decisions
//! - Low-overhead metric updates (no-ops until a recorder is installed)
//! - Prometheus exposition only when enabled in config

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// `kind` is `match` or `resolve`; `outcome` is `hit` or `miss`.
pub fn record_cache_lookup(kind: &'static str, outcome: &'static str) {
    counter!("route_cache_lookups_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_cache_store(kind: &'static str) {
    counter!("route_cache_stores_total", "kind" => kind).increment(1);
}

pub fn record_backend_error(op: &'static str) {
    counter!("route_cache_backend_errors_total", "op" => op).increment(1);
}

pub fn record_cache_clear() {
    counter!("route_cache_clears_total").increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("route_cache_entries").set(entries as f64);
}
