//! Body type shared by requests and responses.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Collected, Empty, Full, LengthLimitError, Limited};

use crate::error::{BoxError, Error};

/// Type-erased HTTP body.
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// Body holding the given bytes.
pub fn full(data: impl Into<Bytes>) -> Body {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Body with no content.
pub fn empty() -> Body {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Convert any compatible body into [`Body`].
pub fn boxed<B>(body: B) -> Body
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// Collect a body into memory, rejecting anything over `limit` bytes.
pub async fn to_bytes(body: Body, limit: usize) -> Result<Bytes, Error> {
    // Boxed so `Send` is proven at a concrete type; awaiting the bare
    // `Collect` trips a higher-ranked lifetime limitation in rustc.
    let collect: Pin<Box<dyn Future<Output = Result<Collected<Bytes>, BoxError>> + Send>> =
        Box::pin(Limited::new(body, limit).collect());
    match collect.await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) => Err(classify(err)),
    }
}

/// Map a body read failure onto a request error.
///
/// Length limits may be enforced upstream (the server wraps incoming
/// bodies in `Limited`), so the limit error can be nested in the chain.
fn classify(err: BoxError) -> Error {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err.as_ref());
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return Error::payload_too_large("request body too large");
        }
        current = e.source();
    }
    Error::bad_request(format!("failed to read request body: {err}"))
}
