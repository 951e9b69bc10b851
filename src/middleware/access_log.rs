//! Access logging.
//!
//! One structured `tracing` event per request, plus request metrics.

use futures_util::future::BoxFuture;

use crate::error::Error;
use crate::http::{RequestInfo, Response};
use crate::middleware::Middleware;
use crate::observability::metrics;

#[derive(Debug, Clone, Default)]
pub struct AccessLog {
    _priv: (),
}

impl AccessLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Middleware for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn after<'a>(
        &'a self,
        info: &'a RequestInfo,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<(), Error>> {
        let status = res.status();
        let latency = info.received_at.elapsed();
        let request_id = info.request_id.as_ref().map(|r| r.as_str()).unwrap_or("-");

        if status.is_server_error() {
            tracing::warn!(
                request_id,
                method = %info.method,
                path = %info.path(),
                route = info.route_label(),
                status = status.as_u16(),
                latency_ms = latency.as_millis() as u64,
                "Request completed"
            );
        } else {
            tracing::info!(
                request_id,
                method = %info.method,
                path = %info.path(),
                route = info.route_label(),
                status = status.as_u16(),
                latency_ms = latency.as_millis() as u64,
                "Request completed"
            );
        }

        metrics::record_request(
            info.method.as_str(),
            info.route_label(),
            status.as_u16(),
            info.received_at,
        );

        Box::pin(async { Ok(()) })
    }
}
