//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count rejections per stage
//! - Count stripped operator keys per source
//! - Track rate-limit store size per route class
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `ingress_rejections_total` (counter): terminal rejections by `reason`
//! - `ingress_stripped_keys_total` (counter): removed keys by `source`
//! - `ingress_preflight_total` (counter): answered CORS preflights
//! - `ingress_tracked_clients` (gauge): clients with a live window, by `class`
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   `--check` runs need no exporter

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::security::rate_limit::RouteClass;

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_rejection(reason: &'static str) {
    counter!("ingress_rejections_total", "reason" => reason).increment(1);
}

pub fn record_stripped_keys(source: &'static str, count: usize) {
    counter!("ingress_stripped_keys_total", "source" => source).increment(count as u64);
}

pub fn record_preflight() {
    counter!("ingress_preflight_total").increment(1);
}

pub fn record_tracked_clients(class: RouteClass, count: usize) {
    gauge!("ingress_tracked_clients", "class" => class.as_str()).set(count as f64);
}
