//! Request-side types and accessors.
//!
//! # Responsibilities
//! - Carry the request id, remote address and matched route through extensions
//! - Expose path parameters to handlers
//! - Snapshot request metadata for `after` hooks and error handlers
//!
//! # Design Decisions
//! - Everything travels in `http::Extensions`; handlers receive the plain request
//! - `RequestInfo` is taken before the handler consumes the request

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http::{HeaderMap, HeaderName, Method, Uri, Version};

use crate::http::body::Body;
use crate::routing::Params;

/// Request type seen by middleware and handlers.
pub type Request = http::Request<Body>;

/// Header carrying the request id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Unique id attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Generate a fresh UUID v4 id.
    pub fn generate() -> Self {
        Self(Arc::from(uuid::Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Peer address of the connection the request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Instant the dispatcher received the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedAt(pub Instant);

/// Pattern of the route that matched the request, e.g. `/users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
    pub pattern: Arc<str>,
    pub name: Option<Arc<str>>,
}

/// Convenience accessors over request extensions.
pub trait RequestExt {
    /// Path parameter by name.
    fn param(&self, name: &str) -> Option<&str>;
    fn params(&self) -> Option<&Params>;
    fn request_id(&self) -> Option<&RequestId>;
    fn matched_route(&self) -> Option<&MatchedRoute>;
    fn remote_addr(&self) -> Option<SocketAddr>;
}

impl<B> RequestExt for http::Request<B> {
    fn param(&self, name: &str) -> Option<&str> {
        self.extensions().get::<Params>()?.get(name)
    }

    fn params(&self) -> Option<&Params> {
        self.extensions().get::<Params>()
    }

    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }

    fn matched_route(&self) -> Option<&MatchedRoute> {
        self.extensions().get::<MatchedRoute>()
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.extensions().get::<RemoteAddr>().map(|a| a.0)
    }
}

/// Snapshot of request metadata.
///
/// Taken once the `before` hooks have run, so it sees anything they attached.
/// Handed to `after` hooks and to the error handler, which run after the
/// handler has taken ownership of the request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub request_id: Option<RequestId>,
    pub route: Option<MatchedRoute>,
    pub params: Params,
    pub remote_addr: Option<SocketAddr>,
    pub received_at: Instant,
}

impl RequestInfo {
    pub fn from_request<B>(req: &http::Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            version: req.version(),
            headers: req.headers().clone(),
            request_id: req.request_id().cloned(),
            route: req.matched_route().cloned(),
            params: req.params().cloned().unwrap_or_default(),
            remote_addr: req.remote_addr(),
            received_at: req
                .extensions()
                .get::<ReceivedAt>()
                .map(|r| r.0)
                .unwrap_or_else(Instant::now),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Route pattern for metric labels; unmatched requests share one label.
    pub fn route_label(&self) -> &str {
        self.route
            .as_ref()
            .map(|r| r.pattern.as_ref())
            .unwrap_or("<unmatched>")
    }
}
