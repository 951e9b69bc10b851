//! HTTP request router with middleware chaining.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──▶ net (bounded listener) ──▶ http::server (hyper + tower edge layers)
//!                                          │
//!                                          ▼
//!                                   dispatch::Dispatcher
//!                                          │  routing::RouteTable::find
//!                                          ▼
//!                      middleware before hooks (global → scope → route)
//!                                          │
//!                                          ▼
//!                                       Handler
//!                                          │
//!                                          ▼
//!                      middleware after hooks (route → scope → global)
//!     Client Response ◀────────────────────┘
//!
//!     Cross-cutting: config, observability, lifecycle
//! ```

// Core subsystems
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod routing;

// Serving
pub mod lifecycle;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use crate::config::ServerConfig;
pub use crate::dispatch::{Dispatcher, Route, Router, RouterBuilder};
pub use crate::error::{Error, RouteError};
pub use crate::handler::Handler;
pub use crate::http::{HttpServer, IntoResponse, Request, RequestExt, Response};
pub use crate::lifecycle::Shutdown;
pub use crate::middleware::{Flow, Middleware};
