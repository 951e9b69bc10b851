//! Router construction.
//!
//! # Responsibilities
//! - Collect routes, scopes and middleware through `RouterBuilder`
//! - Resolve each endpoint's full middleware list once, at build time
//! - Compile everything into an immutable `Router`
//!
//! # Design Decisions
//! - Registration never panics; the first error surfaces from `build()`
//! - Scopes are flattened when added: prefix joined onto each path, scope
//!   middleware placed in front of the route's own
//! - Global middleware is prepended at `build()`, so it applies no matter
//!   whether it was added before or after the routes

use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::config::RoutingConfig;
use crate::error::{Error, RouteError};
use crate::handler::Handler;
use crate::http::response::default_error_response;
use crate::http::{MatchedRoute, RequestInfo, Response};
use crate::middleware::chain::ErrorHandler;
use crate::middleware::Middleware;
use crate::routing::{Pattern, RouteTable};

/// Methods registered by [`RouterBuilder::any`].
pub const ANY_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// A handler bound to one method of one pattern, with its resolved chain.
pub struct Endpoint {
    pub(crate) handler: Arc<dyn Handler>,
    /// Global, then scope, then route middleware.
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) route: MatchedRoute,
}

impl Endpoint {
    pub fn name(&self) -> Option<&str> {
        self.route.name.as_deref()
    }

    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("route", &self.route)
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Behaviour for requests that match no endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Redirect `/a/` to `/a` (and back) when only the other form is routed.
    pub redirect_trailing_slash: bool,
    /// Answer `OPTIONS` with `204` and `allow` when no handler claims it.
    pub handle_options: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            redirect_trailing_slash: true,
            handle_options: true,
        }
    }
}

impl From<&RoutingConfig> for DispatchOptions {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            redirect_trailing_slash: config.redirect_trailing_slash,
            handle_options: config.handle_options,
        }
    }
}

/// A single route registration.
pub struct Route {
    methods: Vec<Method>,
    path: String,
    handler: Arc<dyn Handler>,
    middleware: Vec<Arc<dyn Middleware>>,
    name: Option<Arc<str>>,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self::with_methods(vec![method], path, handler)
    }

    /// Route answering every method in [`ANY_METHODS`].
    pub fn any(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::with_methods(ANY_METHODS.to_vec(), path, handler)
    }

    fn with_methods(methods: Vec<Method>, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            methods,
            path: path.into(),
            handler: Arc::new(handler),
            middleware: Vec::new(),
            name: None,
        }
    }

    /// Add middleware that only runs for this route, after global and scope middleware.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(Arc::from(name.into()));
        self
    }
}

/// Builder for [`Router`].
pub struct RouterBuilder {
    routes: Vec<Route>,
    middleware: Vec<Arc<dyn Middleware>>,
    fallback: Option<Arc<dyn Handler>>,
    error_handler: Option<ErrorHandler>,
    options: DispatchOptions,
    errors: Vec<RouteError>,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            middleware: Vec::new(),
            fallback: None,
            error_handler: None,
            options: DispatchOptions::default(),
            errors: Vec::new(),
        }
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(Method::GET, path, handler))
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(Method::POST, path, handler))
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(Method::PUT, path, handler))
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(Method::PATCH, path, handler))
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(Method::DELETE, path, handler))
    }

    pub fn head(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(Method::HEAD, path, handler))
    }

    pub fn options(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(Method::OPTIONS, path, handler))
    }

    pub fn any(self, path: &str, handler: impl Handler) -> Self {
        self.route(Route::any(path, handler))
    }

    pub fn route(mut self, route: Route) -> Self {
        if route.methods.is_empty() {
            self.errors
                .push(RouteError::invalid(&route.path, "no methods given"));
            return self;
        }
        self.routes.push(route);
        self
    }

    /// Add middleware that wraps every request, matched or not.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Mount `scope`'s routes under `prefix`.
    ///
    /// The scope's middleware runs for its routes only, between the global
    /// middleware and each route's own. Fallback, error handler and options
    /// set on the scope are ignored.
    pub fn scope(mut self, prefix: &str, scope: RouterBuilder) -> Self {
        if !prefix.is_empty() && !prefix.starts_with('/') {
            self.errors
                .push(RouteError::invalid(prefix, "scope prefix must start with `/`"));
        }
        self.errors.extend(scope.errors);

        for mut route in scope.routes {
            route.path = Pattern::join(prefix, &route.path);
            let mut chain = scope.middleware.clone();
            chain.append(&mut route.middleware);
            route.middleware = chain;
            self.routes.push(route);
        }
        self
    }

    /// Handler for requests no route matches.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// Replace the default JSON error rendering.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error, &RequestInfo) -> Response + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn redirect_trailing_slash(mut self, enabled: bool) -> Self {
        self.options.redirect_trailing_slash = enabled;
        self
    }

    pub fn handle_options(mut self, enabled: bool) -> Self {
        self.options.handle_options = enabled;
        self
    }

    /// Take both dispatch switches from the `[routing]` config section.
    pub fn routing_config(mut self, config: &RoutingConfig) -> Self {
        self.options = DispatchOptions::from(config);
        self
    }

    /// Compile the registered routes.
    pub fn build(self) -> Result<Router, RouteError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        let mut table = RouteTable::new();
        for route in self.routes {
            let pattern = Pattern::parse(&route.path)?;
            let matched = MatchedRoute {
                pattern: Arc::from(pattern.as_str()),
                name: route.name.clone(),
            };

            let mut chain = self.middleware.clone();
            chain.extend(route.middleware.iter().cloned());

            for method in route.methods {
                let endpoint = Endpoint {
                    handler: route.handler.clone(),
                    middleware: chain.clone(),
                    route: matched.clone(),
                };
                table.insert(method, pattern.clone(), endpoint)?;
            }
        }

        for (method, pattern) in table.routes() {
            tracing::debug!(method = %method, pattern = %pattern, "Route registered");
        }
        tracing::info!(
            routes = table.len(),
            middleware = self.middleware.len(),
            "Router built"
        );

        Ok(Router {
            table,
            middleware: self.middleware,
            fallback: self.fallback,
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(default_error_response)),
            options: self.options,
        })
    }
}

/// Compiled router: route table plus request-wide settings.
pub struct Router {
    pub(crate) table: RouteTable<Endpoint>,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) fallback: Option<Arc<dyn Handler>>,
    pub(crate) error_handler: ErrorHandler,
    pub(crate) options: DispatchOptions,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn table(&self) -> &RouteTable<Endpoint> {
        &self.table
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.table.len())
            .field("middleware", &self.middleware.len())
            .field("fallback", &self.fallback.is_some())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use crate::middleware::{before_fn, Flow};
    use crate::routing::Lookup;

    async fn ok(_req: Request) -> Result<&'static str, Error> {
        Ok("ok")
    }

    fn pass() -> impl Middleware {
        before_fn(|_| Ok(Flow::Continue))
    }

    #[test]
    fn scope_prefixes_and_orders_middleware() {
        let router = Router::builder()
            .scope(
                "/api",
                RouterBuilder::new()
                    .middleware(pass())
                    .route(Route::new(Method::GET, "/users/{id}", ok).middleware(pass()).name("user")),
            )
            .middleware(pass())
            .build()
            .unwrap();

        match router.table().find(&Method::GET, "/api/users/7") {
            Lookup::Found { endpoint, params, .. } => {
                assert_eq!(endpoint.name(), Some("user"));
                assert_eq!(&*endpoint.route.pattern, "/api/users/{id}");
                assert_eq!(endpoint.middleware().len(), 3);
                assert_eq!(params.get("id"), Some("7"));
            }
            other => panic!("unexpected lookup: {other:?}"),
        }
    }

    #[test]
    fn nested_scopes_join_prefixes() {
        let router = Router::builder()
            .scope(
                "/v1",
                RouterBuilder::new().scope("/admin", RouterBuilder::new().get("/", ok)),
            )
            .build()
            .unwrap();
        assert!(router.table().matches_path("/v1/admin"));
    }

    #[test]
    fn any_registers_common_methods() {
        let router = Router::builder().any("/hook", ok).build().unwrap();
        assert_eq!(router.table().len(), ANY_METHODS.len());
    }

    #[test]
    fn first_registration_error_wins() {
        let err = Router::builder()
            .get("no-slash", ok)
            .get("/a/{x}", ok)
            .get("/a/{y}", ok)
            .build()
            .unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
    }

    #[test]
    fn duplicate_is_rejected() {
        let err = Router::builder()
            .get("/a", ok)
            .get("/a", ok)
            .build()
            .unwrap_err();
        assert!(matches!(err, RouteError::Duplicate { .. }));
    }

    #[test]
    fn options_follow_routing_config() {
        let config = RoutingConfig {
            redirect_trailing_slash: false,
            handle_options: true,
        };
        let router = Router::builder().routing_config(&config).build().unwrap();
        assert!(!router.options().redirect_trailing_slash);
        assert!(router.options().handle_options);
    }
}
