//! Request dispatch.
//!
//! # Responsibilities
//! - Match the request, attach params and route metadata
//! - Run the endpoint's middleware chain around its handler
//! - Answer unmatched requests (405, `OPTIONS`, trailing-slash redirect,
//!   fallback, 404) through the global middleware
//!
//! # Design Decisions
//! - The dispatcher never fails; every outcome is a response
//! - Unmatched outcomes are decided before the chain runs and handed in as
//!   the terminal, so global middleware sees them like any other request
//! - `allow` is attached after the chain, so a 405 keeps it even when an
//!   error handler rebuilt the response. A matched handler that answers 405
//!   itself gets its route's methods

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode, Uri};
use http_body::Body as _;

use crate::dispatch::router::Router;
use crate::error::{BoxError, Error};
use crate::handler::Handler;
use crate::http::body;
use crate::http::response;
use crate::http::{ReceivedAt, Request, Response};
use crate::middleware::chain;
use crate::routing::matcher::method_rank;
use crate::routing::Lookup;

/// What an unmatched request resolves to.
enum Terminal {
    Ready(Result<Response, Error>),
    Fallback(Arc<dyn Handler>),
}

/// Entry point for requests: a cheap, cloneable handle on a [`Router`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
}

impl Dispatcher {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Route `req` and produce its response.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        if req.extensions().get::<ReceivedAt>().is_none() {
            req.extensions_mut().insert(ReceivedAt(Instant::now()));
        }

        let router = &*self.router;
        let method = req.method().clone();

        match router.table.find(&method, req.uri().path()) {
            Lookup::Found {
                route,
                endpoint,
                params,
                head_via_get,
            } => {
                req.extensions_mut().insert(params);
                req.extensions_mut().insert(endpoint.route.clone());

                let handler = endpoint.handler.clone();
                let mut res = chain::run(
                    &endpoint.middleware,
                    req,
                    move |req| Handler::call(&*handler, req),
                    &router.error_handler,
                )
                .await;

                if res.status() == StatusCode::METHOD_NOT_ALLOWED
                    && !res.headers().contains_key(header::ALLOW)
                {
                    let mut allowed: Vec<Method> = route.methods().cloned().collect();
                    if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
                        allowed.push(Method::HEAD);
                    }
                    allowed.sort_by_key(method_rank);
                    res.headers_mut()
                        .insert(header::ALLOW, response::allow_header(&allowed));
                }
                if head_via_get {
                    strip_body(&mut res);
                }
                res
            }
            Lookup::MethodNotAllowed { mut allowed } => {
                if method == Method::OPTIONS && router.options.handle_options {
                    allowed.push(Method::OPTIONS);
                    allowed.sort_by_key(method_rank);
                    let res = response::options(&allowed);
                    return self.unmatched(req, Terminal::Ready(Ok(res))).await;
                }

                let allow = response::allow_header(&allowed);
                let err = Error::method_not_allowed(format!("method {method} not allowed"));
                let mut res = self.unmatched(req, Terminal::Ready(Err(err))).await;
                if res.status() == StatusCode::METHOD_NOT_ALLOWED {
                    res.headers_mut().insert(header::ALLOW, allow);
                }
                res
            }
            Lookup::InvalidParam { name } => {
                let err = Error::bad_request(format!("path parameter `{name}` is not valid UTF-8"));
                self.unmatched(req, Terminal::Ready(Err(err))).await
            }
            Lookup::NotFound => {
                let terminal = match self.redirect_target(&method, req.uri()) {
                    Some(location) => {
                        let get_like = method == Method::GET || method == Method::HEAD;
                        tracing::debug!(location = %location, "Redirecting trailing slash");
                        Terminal::Ready(response::redirect(&location, get_like))
                    }
                    None => match &router.fallback {
                        Some(handler) => Terminal::Fallback(handler.clone()),
                        None => Terminal::Ready(Err(Error::not_found(format!(
                            "no route for {method} {}",
                            req.uri().path()
                        )))),
                    },
                };
                self.unmatched(req, terminal).await
            }
        }
    }

    /// Run `terminal` behind the global middleware only.
    async fn unmatched(&self, req: Request, terminal: Terminal) -> Response {
        let router = &*self.router;
        chain::run(
            &router.middleware,
            req,
            move |req| match terminal {
                Terminal::Ready(outcome) => future::ready(outcome).boxed(),
                Terminal::Fallback(handler) => Handler::call(&*handler, req),
            },
            &router.error_handler,
        )
        .await
    }

    /// The same path with its trailing slash toggled, if that form is routed.
    fn redirect_target(&self, method: &Method, uri: &Uri) -> Option<String> {
        if !self.router.options.redirect_trailing_slash || *method == Method::CONNECT {
            return None;
        }

        let path = uri.path();
        let alternate = match path.strip_suffix('/') {
            Some("") => return None,
            Some(trimmed) => trimmed.to_string(),
            None => format!("{path}/"),
        };
        // `//host` would be read as a scheme-relative URL.
        if alternate.starts_with("//") || !self.router.table.matches_path(&alternate) {
            return None;
        }

        Some(match uri.query() {
            Some(query) => format!("{alternate}?{query}"),
            None => alternate,
        })
    }
}

/// Drop the body of a `HEAD` answer while keeping the length it would have had.
fn strip_body(res: &mut Response) {
    if !res.headers().contains_key(header::CONTENT_LENGTH) {
        if let Some(len) = res.body().size_hint().exact() {
            res.headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
    }
    *res.body_mut() = body::empty();
}

impl<B> tower::Service<http::Request<B>> for Dispatcher
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let this = self.clone();
        let req = req.map(body::boxed);
        Box::pin(async move { Ok(this.dispatch(req).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::router::RouterBuilder;

    async fn ok(_req: Request) -> Result<&'static str, Error> {
        Ok("ok")
    }

    fn dispatcher(builder: RouterBuilder) -> Dispatcher {
        Dispatcher::new(builder.build().unwrap())
    }

    #[test]
    fn redirect_target_toggles_slash_and_keeps_query() {
        let d = dispatcher(RouterBuilder::new().get("/docs", ok).get("/blog/", ok));

        let uri: Uri = "/docs/?page=2".parse().unwrap();
        assert_eq!(
            d.redirect_target(&Method::GET, &uri).as_deref(),
            Some("/docs?page=2")
        );

        let uri: Uri = "/blog".parse().unwrap();
        assert_eq!(d.redirect_target(&Method::POST, &uri).as_deref(), Some("/blog/"));

        let uri: Uri = "/missing".parse().unwrap();
        assert_eq!(d.redirect_target(&Method::GET, &uri), None);
    }

    #[test]
    fn redirect_disabled() {
        let d = dispatcher(RouterBuilder::new().get("/docs", ok).redirect_trailing_slash(false));
        let uri: Uri = "/docs/".parse().unwrap();
        assert_eq!(d.redirect_target(&Method::GET, &uri), None);
    }

    #[tokio::test]
    async fn head_served_by_get_keeps_length() {
        let d = dispatcher(RouterBuilder::new().get("/page", ok));
        let req = http::Request::builder()
            .method(Method::HEAD)
            .uri("/page")
            .body(body::empty())
            .unwrap();

        let res = d.dispatch(req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_LENGTH], "2");
        assert_eq!(res.body().size_hint().exact(), Some(0));
    }
}
