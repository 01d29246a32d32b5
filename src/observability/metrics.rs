//! Metrics collection and exposition.
//!
//! # Metrics
//! - `region_router_decisions_total` (counter): by outcome
//! - `region_router_reloads_total` (counter): by trigger, result
//! - `region_router_routes` (gauge): keys in the current table
//! - `region_router_table_generation` (gauge)
//! - `region_router_skipped_duplicates_total` (counter)
//! - `region_router_dns_lookups_total` (counter): by result

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::routing::ReplaceSummary;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count a redirect decision (`pass_through`, `redirect`, `same_host`, `invalid_target`, `unavailable`).
pub fn record_decision(outcome: &'static str) {
    metrics::counter!("region_router_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_reload(trigger: &'static str, success: bool) {
    let result = if success { "ok" } else { "error" };
    metrics::counter!("region_router_reloads_total", "trigger" => trigger, "result" => result).increment(1);
}

pub fn record_table(summary: &ReplaceSummary, routes: usize) {
    metrics::gauge!("region_router_routes").set(routes as f64);
    metrics::gauge!("region_router_table_generation").set(summary.generation as f64);
    if summary.skipped_duplicates > 0 {
        metrics::counter!("region_router_skipped_duplicates_total").increment(summary.skipped_duplicates as u64);
    }
}

pub fn record_dns_lookup(result: &'static str) {
    metrics::counter!("region_router_dns_lookups_total", "result" => result).increment(1);
}
