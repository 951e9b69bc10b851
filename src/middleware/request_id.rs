//! Request id propagation.
//!
//! # Responsibilities
//! - Honour an incoming `x-request-id`, or generate a UUID v4
//! - Make the id available to later middleware and handlers
//! - Echo the id on every response, errors included
//!
//! # Design Decisions
//! - Added as the outermost middleware so every log line can carry the id
//! - Oversized or non-visible-ASCII incoming ids are replaced, not trusted

use futures_util::future::BoxFuture;
use http::HeaderValue;

use crate::error::Error;
use crate::http::{Request, RequestId, RequestInfo, Response, X_REQUEST_ID};
use crate::middleware::{Flow, Middleware};

const MAX_INCOMING_LEN: usize = 128;

#[derive(Debug, Clone, Default)]
pub struct RequestIdMiddleware {
    _priv: (),
}

impl RequestIdMiddleware {
    pub fn new() -> Self {
        Self::default()
    }
}

fn incoming_id(req: &Request) -> Option<RequestId> {
    let value = req.headers().get(X_REQUEST_ID)?.to_str().ok()?;
    if value.is_empty() || value.len() > MAX_INCOMING_LEN {
        return None;
    }
    Some(RequestId::from(value))
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn before<'a>(&'a self, req: &'a mut Request) -> BoxFuture<'a, Result<Flow, Error>> {
        let id = incoming_id(req).unwrap_or_else(RequestId::generate);
        if let Ok(value) = HeaderValue::from_str(id.as_str()) {
            req.headers_mut().insert(X_REQUEST_ID, value);
        }
        req.extensions_mut().insert(id);
        Box::pin(async { Ok(Flow::Continue) })
    }

    fn after<'a>(
        &'a self,
        info: &'a RequestInfo,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<(), Error>> {
        if let Some(id) = &info.request_id {
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                res.headers_mut().insert(X_REQUEST_ID, value);
            }
        }
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{body, RequestExt};
    use http::StatusCode;

    #[tokio::test]
    async fn generates_and_echoes() {
        let mw = RequestIdMiddleware::new();
        let mut req = http::Request::new(body::empty());
        mw.before(&mut req).await.unwrap();

        let id = req.request_id().cloned().expect("id attached");
        assert_eq!(uuid::Uuid::parse_str(id.as_str()).unwrap().get_version_num(), 4);

        let info = RequestInfo::from_request(&req);
        let mut res = http::Response::new(body::empty());
        *res.status_mut() = StatusCode::NOT_FOUND;
        mw.after(&info, &mut res).await.unwrap();
        assert_eq!(res.headers()[X_REQUEST_ID], id.as_str());
    }

    #[tokio::test]
    async fn keeps_incoming_id() {
        let mw = RequestIdMiddleware::new();
        let mut req = http::Request::builder()
            .header("x-request-id", "client-supplied-7")
            .body(body::empty())
            .unwrap();
        mw.before(&mut req).await.unwrap();
        assert_eq!(req.request_id().unwrap().as_str(), "client-supplied-7");
    }

    #[tokio::test]
    async fn replaces_oversized_id() {
        let mw = RequestIdMiddleware::new();
        let mut req = http::Request::builder()
            .header("x-request-id", "x".repeat(MAX_INCOMING_LEN + 1))
            .body(body::empty())
            .unwrap();
        mw.before(&mut req).await.unwrap();
        assert_eq!(req.request_id().unwrap().as_str().len(), 36);
    }
}
