//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → before hooks, registration order   (global → scope → route)
//!     → handler
//!     → after hooks, reverse order         (route → scope → global)
//! Response
//! ```
//!
//! # Design Decisions
//! - `before` may short-circuit with `Flow::Respond`; later hooks and the
//!   handler are skipped
//! - `after` runs only for middleware whose `before` ran
//! - Errors anywhere become a response via the router's error handler, and
//!   unwinding continues outward

pub mod access_log;
pub mod chain;
pub mod rate_limit;
pub mod request_id;

use futures_util::future::BoxFuture;

use crate::error::Error;
use crate::http::{Request, RequestInfo, Response};

pub use access_log::AccessLog;
pub use rate_limit::RateLimit;
pub use request_id::RequestIdMiddleware;

/// Outcome of a `before` hook.
#[derive(Debug)]
pub enum Flow {
    /// Pass the request on to the next middleware (or the handler).
    Continue,
    /// Stop here and answer with this response.
    Respond(Response),
}

/// An interceptor invoked around the matched handler.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in log fields.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn before<'a>(&'a self, _req: &'a mut Request) -> BoxFuture<'a, Result<Flow, Error>> {
        Box::pin(async { Ok(Flow::Continue) })
    }

    fn after<'a>(
        &'a self,
        _info: &'a RequestInfo,
        _res: &'a mut Response,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async { Ok(()) })
    }
}

/// Middleware built from a synchronous `before` closure.
pub struct BeforeFn<F>(F);

/// Middleware built from a synchronous `after` closure.
pub struct AfterFn<F>(F);

/// Wrap `f` as a `before`-only middleware.
pub fn before_fn<F>(f: F) -> BeforeFn<F>
where
    F: Fn(&mut Request) -> Result<Flow, Error> + Send + Sync + 'static,
{
    BeforeFn(f)
}

/// Wrap `f` as an `after`-only middleware.
pub fn after_fn<F>(f: F) -> AfterFn<F>
where
    F: Fn(&RequestInfo, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
{
    AfterFn(f)
}

impl<F> Middleware for BeforeFn<F>
where
    F: Fn(&mut Request) -> Result<Flow, Error> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "before_fn"
    }

    fn before<'a>(&'a self, req: &'a mut Request) -> BoxFuture<'a, Result<Flow, Error>> {
        let outcome = (self.0)(req);
        Box::pin(async move { outcome })
    }
}

impl<F> Middleware for AfterFn<F>
where
    F: Fn(&RequestInfo, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "after_fn"
    }

    fn after<'a>(
        &'a self,
        info: &'a RequestInfo,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<(), Error>> {
        let outcome = (self.0)(info, res);
        Box::pin(async move { outcome })
    }
}
