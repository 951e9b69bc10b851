//! Response construction.
//!
//! # Responsibilities
//! - Convert handler return values into responses (`IntoResponse`)
//! - Build the canned responses the dispatcher sends (redirects, `allow` lists)
//! - Render errors into the default JSON error body

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use serde::Serialize;

use crate::error::Error;
use crate::http::body::{self, Body};
use crate::http::request::RequestInfo;

/// Response type produced by handlers and middleware.
pub type Response = http::Response<Body>;

/// Conversion into a [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut res = Response::new(body::empty());
        *res.status_mut() = self;
        res
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        text(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        text(self)
    }
}

impl IntoResponse for Bytes {
    fn into_response(self) -> Response {
        octets(self)
    }
}

impl IntoResponse for Vec<u8> {
    fn into_response(self) -> Response {
        octets(self)
    }
}

impl<T: IntoResponse> IntoResponse for (StatusCode, T) {
    fn into_response(self) -> Response {
        let mut res = self.1.into_response();
        *res.status_mut() = self.0;
        res
    }
}

fn text(content: impl Into<Bytes>) -> Response {
    let mut res = Response::new(body::full(content));
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}

fn octets(content: impl Into<Bytes>) -> Response {
    let mut res = Response::new(body::full(content));
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    res
}

/// Format an `allow` header value from a method list.
pub fn allow_header(methods: &[Method]) -> HeaderValue {
    let joined = methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    // Method names are tokens, always valid header characters.
    HeaderValue::from_str(&joined).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// 204 reply to an `OPTIONS` request with no explicit handler.
pub fn options(methods: &[Method]) -> Response {
    let mut res = StatusCode::NO_CONTENT.into_response();
    res.headers_mut().insert(header::ALLOW, allow_header(methods));
    res
}

/// Redirect to `location`; `permanent_get` selects 301 over 308.
pub fn redirect(location: &str, permanent_get: bool) -> Result<Response, Error> {
    let status = if permanent_get {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::PERMANENT_REDIRECT
    };
    let value = HeaderValue::from_str(location)
        .map_err(|_| Error::bad_request("redirect target is not a valid header value"))?;
    let mut res = status.into_response();
    res.headers_mut().insert(header::LOCATION, value);
    Ok(res)
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: u16,
    error: &'a str,
    message: String,
}

/// Default error rendering: a small JSON document.
///
/// Server errors are logged with their cause; the client only sees the
/// canonical reason phrase.
pub fn default_error_response(err: &Error, info: &RequestInfo) -> Response {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(
            request_id = info.request_id.as_ref().map(|r| r.as_str()).unwrap_or("-"),
            method = %info.method,
            path = %info.path(),
            error = %err,
            "Request failed"
        );
    } else {
        tracing::debug!(
            method = %info.method,
            path = %info.path(),
            status = status.as_u16(),
            error = %err,
            "Request rejected"
        );
    }

    let payload = ErrorBody {
        status: status.as_u16(),
        error: status.canonical_reason().unwrap_or("Unknown"),
        message: err.public_message(),
    };
    let bytes = serde_json::to_vec(&payload).unwrap_or_default();

    let mut res = Response::new(body::full(bytes));
    *res.status_mut() = status;
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> RequestInfo {
        let req = http::Request::builder()
            .uri("/x")
            .body(body::empty())
            .unwrap();
        RequestInfo::from_request(&req)
    }

    #[test]
    fn tuple_overrides_status() {
        let res = (StatusCode::CREATED, "made").into_response();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn unit_is_no_content() {
        assert_eq!(().into_response().status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn allow_lists_methods_in_order() {
        let value = allow_header(&[Method::GET, Method::HEAD, Method::POST]);
        assert_eq!(value, "GET, HEAD, POST");
    }

    #[test]
    fn redirect_status_depends_on_method() {
        assert_eq!(
            redirect("/a/", true).unwrap().status(),
            StatusCode::MOVED_PERMANENTLY
        );
        let res = redirect("/a/", false).unwrap();
        assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(res.headers()[header::LOCATION], "/a/");
    }

    #[tokio::test]
    async fn error_body_is_json() {
        let res = default_error_response(&Error::forbidden("nope"), &info());
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let bytes = body::to_bytes(res.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], 403);
        assert_eq!(json["error"], "Forbidden");
        assert_eq!(json["message"], "nope");
    }
}
