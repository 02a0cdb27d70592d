//! # Router
//!
//! Ordered, per-method route tables with first-match-wins dispatch.
//!
//! ## Features
//!
//! - Path parameters (`/apis/{id}`), one segment each
//! - Handler values or `Controller@action` names as targets
//! - Per-route middleware chains, outermost first
//! - RESTful resource expansion (six routes per prefix)
//!
//! Routes are tried in the order they were added. An earlier pattern that
//! matches always wins, even over a later literal one:
//!
//! ```text
//! GET /apis/{id}       ← registered first, matches /apis/special
//! GET /apis/special    ← never reached
//! ```

use crate::error::{Error, Result};
use crate::handler::{resource_action, Action, Endpoint, Resource, Target};
use crate::middleware::{MiddlewareRef, Next};
use crate::registry::Registry;
use crate::request::{normalize_path, Request};
use crate::response::Response;
use crate::route::{CompiledPattern, Params, Route};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Upper-case method token
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Whether request bodies are parsed for this method
    #[must_use]
    pub const fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }

    /// Convert from hyper's method type
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::PATCH => Some(Self::Patch),
            hyper::Method::HEAD => Some(Self::Head),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(Error::UnsupportedMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// When named handlers and middlewares are looked up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Resolution {
    /// At registration; unknown names fail `add_route`
    #[default]
    Eager,
    /// At every dispatch; unknown names answer 500
    Deferred,
}

/// A matched route with its extracted parameters
#[derive(Debug)]
pub struct Match<'a> {
    /// The matched route
    pub route: &'a Route,
    /// Extracted path parameters
    pub params: Params,
}

/// HTTP router with ordered per-method route lists
#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
    registry: Registry,
    resolution: Resolution,
}

impl Router {
    /// Create an empty router with eager resolution
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router that resolves names from `registry`
    #[must_use]
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// Switch to deferred (per-dispatch) resolution
    #[must_use]
    pub const fn deferred(mut self) -> Self {
        self.resolution = Resolution::Deferred;
        self
    }

    /// Active resolution mode
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Named handlers and middlewares
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the registry, for registering names after construction
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Register a route
    ///
    /// `middlewares` run in the given order, the first one outermost.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed.
    /// With eager resolution, returns `Error::UnresolvedHandler` or
    /// `Error::UnresolvedMiddleware` for names missing from the registry.
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        target: impl Into<Target>,
        middlewares: &[MiddlewareRef],
    ) -> Result<()> {
        let compiled = CompiledPattern::compile(pattern)?;
        let endpoint = self.resolve_target(target.into())?;
        let middlewares = self.resolve_middlewares(middlewares)?;

        let routes = self.routes.entry(method).or_default();
        if let Some(existing) = routes
            .iter()
            .find(|r| normalize_path(r.pattern()) == normalize_path(pattern))
        {
            debug!(
                method = %method,
                pattern = %pattern,
                "Route shadowed by earlier registration of {}",
                existing.pattern()
            );
        }

        debug!(method = %method, pattern = %pattern, "Route registered");
        routes.push(Route::new(method, compiled, endpoint, middlewares));
        Ok(())
    }

    fn resolve_target(&self, target: Target) -> Result<Endpoint> {
        match target {
            Target::Handler(handler) => Ok(Endpoint::Resolved(handler)),
            Target::Named(name) => match self.resolution {
                Resolution::Deferred => Ok(Endpoint::Deferred(name)),
                Resolution::Eager => self
                    .registry
                    .handler_by_name(&name)
                    .map(|h| Endpoint::Resolved(Arc::clone(h)))
                    .ok_or(Error::UnresolvedHandler { reference: name }),
            },
        }
    }

    fn resolve_middlewares(&self, middlewares: &[MiddlewareRef]) -> Result<Vec<MiddlewareRef>> {
        middlewares
            .iter()
            .map(|mw| match (mw, self.resolution) {
                (MiddlewareRef::Named(name), Resolution::Eager) => self
                    .registry
                    .middleware_by_name(name)
                    .map(|m| MiddlewareRef::Instance(Arc::clone(m)))
                    .ok_or_else(|| Error::UnresolvedMiddleware {
                        reference: name.clone(),
                    }),
                _ => Ok(mw.clone()),
            })
            .collect()
    }

    /// Register a GET route
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn get(
        &mut self,
        pattern: &str,
        target: impl Into<Target>,
        middlewares: &[MiddlewareRef],
    ) -> Result<()> {
        self.add_route(Method::Get, pattern, target, middlewares)
    }

    /// Register a POST route
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn post(
        &mut self,
        pattern: &str,
        target: impl Into<Target>,
        middlewares: &[MiddlewareRef],
    ) -> Result<()> {
        self.add_route(Method::Post, pattern, target, middlewares)
    }

    /// Register a PUT route
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn put(
        &mut self,
        pattern: &str,
        target: impl Into<Target>,
        middlewares: &[MiddlewareRef],
    ) -> Result<()> {
        self.add_route(Method::Put, pattern, target, middlewares)
    }

    /// Register a PATCH route
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn patch(
        &mut self,
        pattern: &str,
        target: impl Into<Target>,
        middlewares: &[MiddlewareRef],
    ) -> Result<()> {
        self.add_route(Method::Patch, pattern, target, middlewares)
    }

    /// Register a DELETE route
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn delete(
        &mut self,
        pattern: &str,
        target: impl Into<Target>,
        middlewares: &[MiddlewareRef],
    ) -> Result<()> {
        self.add_route(Method::Delete, pattern, target, middlewares)
    }

    /// Register the six RESTful routes of a named controller
    ///
    /// ```text
    /// GET    /prefix       → Controller@index
    /// POST   /prefix       → Controller@store
    /// GET    /prefix/{id}  → Controller@show
    /// PUT    /prefix/{id}  → Controller@update
    /// PATCH  /prefix/{id}  → Controller@update
    /// DELETE /prefix/{id}  → Controller@destroy
    /// ```
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`]. Routes added before a failure stay registered.
    pub fn restful(
        &mut self,
        prefix: &str,
        controller: &str,
        middlewares: &[MiddlewareRef],
    ) -> Result<()> {
        for (method, with_id, action) in Action::ROUTES {
            let target = Target::Named(format!("{controller}@{action}"));
            self.add_route(method, &member_path(prefix, with_id), target, middlewares)?;
        }
        Ok(())
    }

    /// Register the six RESTful routes of a resource value
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn resource<R: Resource>(
        &mut self,
        prefix: &str,
        resource: Arc<R>,
        middlewares: &[MiddlewareRef],
    ) -> Result<()> {
        for (method, with_id, action) in Action::ROUTES {
            let target = Target::Handler(resource_action(&resource, action));
            self.add_route(method, &member_path(prefix, with_id), target, middlewares)?;
        }
        Ok(())
    }

    /// All routes, grouped by method in a stable order
    #[must_use]
    pub fn routes(&self) -> Vec<&Route> {
        const ORDER: [Method; 7] = [
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Patch,
            Method::Delete,
            Method::Head,
            Method::Options,
        ];
        ORDER
            .iter()
            .filter_map(|m| self.routes.get(m))
            .flatten()
            .collect()
    }

    /// Total number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Check if no routes are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the first route matching `method` and `path`
    #[must_use]
    pub fn match_route(&self, method: Method, path: &str) -> Option<Match<'_>> {
        let path = normalize_path(path);
        self.routes.get(&method)?.iter().find_map(|route| {
            route.matches(&path).map(|params| Match { route, params })
        })
    }

    /// Run a request through the matched route's middlewares and handler
    ///
    /// Unmatched requests answer with the 404 envelope.
    #[must_use]
    pub fn dispatch(&self, request: Request) -> Response {
        let Some(Match { route, params }) = self.match_route(request.method, &request.path) else {
            debug!(method = %request.method, path = %request.path, "No route matched");
            return Response::not_found();
        };

        Next::new(&route.middlewares, &route.endpoint, &self.registry).run(request, params)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes())
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

fn member_path(prefix: &str, with_id: bool) -> String {
    let base = format!("/{}", prefix.trim_matches('/'));
    match (with_id, base.as_str()) {
        (false, _) => base,
        (true, "/") => "/{id}".to_string(),
        (true, _) => format!("{base}/{{id}}"),
    }
}
