//! Metrics collection and export for the live channel.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format. Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use radar_core::DispatchOutcome;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const ENVELOPES_TOTAL: &str = "radar_envelopes_total";
    pub const LISTENER_FAILURES_TOTAL: &str = "radar_listener_failures_total";
    pub const RECONNECT_ATTEMPTS_TOTAL: &str = "radar_reconnect_attempts_total";
    pub const CONNECTIONS_TOTAL: &str = "radar_connections_total";
    pub const CONNECTED: &str = "radar_connected";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::ENVELOPES_TOTAL,
        "Total number of envelopes dispatched, by topic"
    );
    metrics::describe_counter!(
        names::LISTENER_FAILURES_TOTAL,
        "Total number of listener invocations that panicked"
    );
    metrics::describe_counter!(
        names::RECONNECT_ATTEMPTS_TOTAL,
        "Total number of scheduled reconnect attempts"
    );
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of successful connections"
    );
    metrics::describe_gauge!(names::CONNECTED, "1 while the live connection is open");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a dispatched envelope.
pub fn record_dispatch(outcome: &DispatchOutcome) {
    counter!(names::ENVELOPES_TOTAL, "topic" => outcome.topic.as_str()).increment(1);
    if outcome.failed > 0 {
        counter!(names::LISTENER_FAILURES_TOTAL).increment(outcome.failed as u64);
    }
}

/// Record a scheduled reconnect.
pub fn record_reconnect_attempt() {
    counter!(names::RECONNECT_ATTEMPTS_TOTAL).increment(1);
}

/// Record an opened connection.
pub fn record_connected() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTED).set(1.0);
}

/// Record a lost or closed connection.
pub fn record_disconnected() {
    gauge!(names::CONNECTED).set(0.0);
}
