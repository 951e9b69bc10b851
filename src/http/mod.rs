//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper auto builder, HTTP/1.1 + HTTP/2)
//!     → tower layers (trace span, deadline, body cap, remote addr)
//!     → Dispatcher (match, middleware, handler)
//!     → response.rs (IntoResponse, canned replies, error bodies)
//!     → Send to client
//! ```

pub mod body;
pub mod request;
pub mod response;
pub mod server;

pub use body::Body;
pub use request::{
    MatchedRoute, ReceivedAt, RemoteAddr, Request, RequestExt, RequestId, RequestInfo,
    X_REQUEST_ID,
};
pub use response::{IntoResponse, Response};
pub use server::{HttpServer, ServerError};
