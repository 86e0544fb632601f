//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dev_router_dispatch_total` (counter): requests by action
//! - `dev_router_rejections_total` (counter): requests refused by the router, by reason
//! - `dev_router_forward_total` (counter): completed HTTP forwards by rule and status
//! - `dev_router_forward_errors_total` (counter): failed forwards by rule
//! - `dev_router_forward_duration_seconds` (histogram): backend round trip
//! - `dev_router_websocket_active` (gauge): relayed WebSocket pairs
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - The Prometheus endpoint is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_dispatch(action: &'static str) {
    counter!("dev_router_dispatch_total", "action" => action).increment(1);
}

pub fn record_rejection(reason: &'static str) {
    counter!("dev_router_rejections_total", "reason" => reason).increment(1);
}

pub fn record_forward(rule: &str, status: u16, start: Instant) {
    counter!(
        "dev_router_forward_total",
        "rule" => rule.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("dev_router_forward_duration_seconds", "rule" => rule.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_forward_error(rule: &str, kind: &'static str) {
    counter!(
        "dev_router_forward_errors_total",
        "rule" => rule.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn websocket_opened() {
    gauge!("dev_router_websocket_active").increment(1.0);
}

pub fn websocket_closed() {
    gauge!("dev_router_websocket_active").decrement(1.0);
}
