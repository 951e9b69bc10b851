//! Metrics collection and exposition.
//!
//! # Metrics
//! - `switchboard_requests_total` (counter): requests by method, route, status
//! - `switchboard_request_duration_seconds` (histogram): latency by method, route
//! - `switchboard_rate_limited_total` (counter): rejected by the rate limiter
//! - `switchboard_active_connections` (gauge): open client connections
//!
//! # Design Decisions
//! - Route label is the pattern (`/users/{id}`), never the raw path, so
//!   label cardinality stays bounded
//! - Recording is a no-op until a recorder is installed

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    metrics::counter!(
        "switchboard_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "switchboard_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("switchboard_rate_limited_total").increment(1);
}

pub fn connection_opened() {
    metrics::gauge!("switchboard_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("switchboard_active_connections").decrement(1.0);
}
