//! Terminal request handlers.

use std::future::Future;

use futures_util::future::BoxFuture;

use crate::error::Error;
use crate::http::{IntoResponse, Request, Response};

/// The terminal function producing a response for a request.
///
/// Implemented for any `async fn(Request) -> Result<impl IntoResponse, Error>`
/// and equivalent closures.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Response, Error>>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Response, Error>> {
        let fut = (self)(req);
        Box::pin(async move { fut.await.map(IntoResponse::into_response) })
    }
}
