//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     RouterBuilder (routes, scopes, middleware, fallback, error handler)
//!     → router.rs (resolve chains, compile RouteTable)
//!     → Router (immutable) → Dispatcher (Arc handle, tower::Service)
//!
//! Per request:
//!     → dispatcher.rs (RouteTable::find)
//!     → Found: endpoint chain (global → scope → route) around the handler
//!     → otherwise: global chain around a canned reply, fallback or 404
//!     → Response
//! ```

pub mod dispatcher;
pub mod router;

pub use dispatcher::Dispatcher;
pub use router::{DispatchOptions, Endpoint, Route, Router, RouterBuilder, ANY_METHODS};
