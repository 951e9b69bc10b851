//! Per-client rate limiting.
//!
//! # Design Decisions
//! - Token bucket per client key, refilled continuously at `requests_per_second`
//! - Client key is the peer IP; the first `x-forwarded-for` hop is only used
//!   when explicitly trusted
//! - Rejections carry `retry-after` and short-circuit the chain
//! - Idle buckets are swept periodically so the map cannot grow without bound

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use http::header::{self, HeaderValue};
use http::StatusCode;

use crate::config::RateLimitConfig;
use crate::error::Error;
use crate::http::{IntoResponse, Request, RequestExt, Response};
use crate::middleware::{Flow, Middleware};
use crate::observability::metrics;

const SWEEP_EVERY: u64 = 1024;
const MIN_IDLE: Duration = Duration::from_secs(60);

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// Take one token, or report how long until one is available.
    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / refill_rate))
        }
    }
}

/// Rate limiting middleware.
#[derive(Debug)]
pub struct RateLimit {
    buckets: DashMap<String, TokenBucket>,
    rps: f64,
    burst: f64,
    trust_forwarded_for: bool,
    seen: AtomicU64,
}

impl RateLimit {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            rps: f64::from(config.requests_per_second.max(1)),
            burst: f64::from(config.burst_size.max(1)),
            trust_forwarded_for: config.trust_forwarded_for,
            seen: AtomicU64::new(0),
        }
    }

    fn client_key(&self, req: &Request) -> String {
        if self.trust_forwarded_for {
            let forwarded = req
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(client) = forwarded {
                return client.to_string();
            }
        }
        req.remote_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Charge one request to `key`; `Err` carries the suggested wait.
    fn check(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));
        bucket.try_acquire(self.burst, self.rps, now)
    }

    /// Drop buckets untouched for longer than `max_idle`.
    pub fn sweep(&self, max_idle: Duration) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < max_idle);
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    fn idle_window(&self) -> Duration {
        // A bucket idle for this long has fully refilled anyway.
        Duration::from_secs_f64(self.burst / self.rps).max(MIN_IDLE)
    }
}

fn too_many_requests(wait: Duration) -> Response {
    let secs = wait.as_secs_f64().ceil().max(1.0) as u64;
    let mut res = (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    res.headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    res
}

impl Middleware for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn before<'a>(&'a self, req: &'a mut Request) -> BoxFuture<'a, Result<Flow, Error>> {
        if self.seen.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep(self.idle_window());
        }

        let key = self.client_key(req);
        let flow = match self.check(&key, Instant::now()) {
            Ok(()) => Flow::Continue,
            Err(wait) => {
                tracing::warn!(client = %key, retry_after_ms = wait.as_millis() as u64, "Rate limit exceeded");
                metrics::record_rate_limited();
                Flow::Respond(too_many_requests(wait))
            }
        };
        Box::pin(async move { Ok(flow) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{body, RemoteAddr};

    fn config(rps: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_second: rps,
            burst_size: burst,
            trust_forwarded_for: false,
        }
    }

    fn request_from(ip: &str) -> Request {
        let mut req = http::Request::new(body::empty());
        req.extensions_mut()
            .insert(RemoteAddr(format!("{ip}:4000").parse().unwrap()));
        req
    }

    #[test]
    fn bucket_allows_burst_then_refills() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(2.0);
        bucket.last_update = start;

        assert!(bucket.try_acquire(2.0, 1.0, start).is_ok());
        assert!(bucket.try_acquire(2.0, 1.0, start).is_ok());
        let wait = bucket.try_acquire(2.0, 1.0, start).unwrap_err();
        assert!(wait <= Duration::from_secs(1));

        assert!(bucket.try_acquire(2.0, 1.0, start + Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn rejects_with_retry_after() {
        let limiter = RateLimit::new(&config(1, 1));

        let mut first = request_from("10.0.0.1");
        assert!(matches!(limiter.before(&mut first).await, Ok(Flow::Continue)));

        let mut second = request_from("10.0.0.1");
        match limiter.before(&mut second).await {
            Ok(Flow::Respond(res)) => {
                assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(res.headers()[header::RETRY_AFTER], "1");
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        // Other clients have their own bucket.
        let mut other = request_from("10.0.0.2");
        assert!(matches!(limiter.before(&mut other).await, Ok(Flow::Continue)));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn forwarded_for_only_when_trusted() {
        let mut req = request_from("10.0.0.1");
        req.headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));

        let untrusted = RateLimit::new(&config(1, 1));
        assert_eq!(untrusted.client_key(&req), "10.0.0.1");

        let mut cfg = config(1, 1);
        cfg.trust_forwarded_for = true;
        let trusted = RateLimit::new(&cfg);
        assert_eq!(trusted.client_key(&req), "203.0.113.9");
    }

    #[test]
    fn sweep_drops_idle_buckets() {
        let limiter = RateLimit::new(&config(10, 10));
        limiter.check("a", Instant::now()).unwrap();
        assert_eq!(limiter.tracked_clients(), 1);

        limiter.sweep(Duration::ZERO);
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
