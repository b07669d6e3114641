//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): tunnel requests by outcome
//! - `relay_request_duration_seconds` (histogram): time to response head
//!
//! Outcomes: `forwarded`, `decode`, `request`, `forbidden`, `upstream`.
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is opt-in via configuration

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "relay_requests_total";
pub const REQUEST_DURATION: &str = "relay_request_duration_seconds";

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one tunnel request.
pub fn record_tunnel(outcome: &'static str, start: Instant) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(REQUEST_DURATION, "outcome" => outcome).record(start.elapsed().as_secs_f64());
}
