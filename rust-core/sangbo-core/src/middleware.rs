//! # Middleware System
//!
//! Chain-of-responsibility around a route's handler.
//!
//! A middleware receives the request, the route parameters and a [`Next`]
//! continuation. It may answer on its own (short-circuit), hand a modified
//! request to `next`, or post-process the response `next` returns. Because
//! each middleware owns both phases of its own call, the pre-phase runs in
//! list order and the post-phase in reverse.
//!
//! ```text
//! A.before → B.before → handler → B.after → A.after
//! ```

use crate::error::Error;
use crate::handler::Endpoint;
use crate::registry::Registry;
use crate::request::Request;
use crate::response::Response;
use crate::route::Params;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Middleware trait for request/response interception
pub trait Middleware: Send + Sync {
    /// Process the request, calling `next` to continue the chain
    fn handle(&self, request: Request, params: Params, next: Next<'_>) -> Response;

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Reference to a middleware on a route
#[derive(Clone)]
pub enum MiddlewareRef {
    /// A name looked up in the router's [`Registry`]
    Named(String),
    /// A middleware instance
    Instance(Arc<dyn Middleware>),
}

impl MiddlewareRef {
    /// Wrap a middleware instance
    pub fn new<M: Middleware + 'static>(middleware: M) -> Self {
        Self::Instance(Arc::new(middleware))
    }

    /// Display label: the registry name or the middleware's own name
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Instance(mw) => mw.name().to_string(),
        }
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(mw) => f.debug_tuple("Instance").field(&mw.name()).finish(),
        }
    }
}

impl From<&str> for MiddlewareRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for MiddlewareRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareRef {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        Self::Instance(middleware)
    }
}

/// The rest of the pipeline after the current middleware
///
/// Built fresh for every dispatch; consuming it with [`Next::run`] means it
/// can be called at most once.
pub struct Next<'a> {
    chain: &'a [MiddlewareRef],
    endpoint: &'a Endpoint,
    registry: &'a Registry,
}

impl<'a> Next<'a> {
    pub(crate) const fn new(
        chain: &'a [MiddlewareRef],
        endpoint: &'a Endpoint,
        registry: &'a Registry,
    ) -> Self {
        Self {
            chain,
            endpoint,
            registry,
        }
    }

    /// Number of middlewares still ahead of the handler
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.chain.len()
    }

    /// Run the remaining middlewares and the handler
    pub fn run(self, request: Request, params: Params) -> Response {
        let Some((head, rest)) = self.chain.split_first() else {
            return self.endpoint.call(self.registry, &request, &params);
        };

        let next = Next::new(rest, self.endpoint, self.registry);
        match head {
            MiddlewareRef::Instance(mw) => mw.handle(request, params, next),
            MiddlewareRef::Named(name) => match self.registry.middleware_by_name(name) {
                Some(mw) => mw.handle(request, params, next),
                None => {
                    warn!(middleware = %name, path = %request.path, "Unresolved middleware");
                    Response::from_error(&Error::UnresolvedMiddleware {
                        reference: name.clone(),
                    })
                }
            },
        }
    }
}

/// Logging middleware - logs each request with its latency
#[derive(Default)]
pub struct LoggingMiddleware {
    log_headers: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable header logging
    #[must_use]
    pub const fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Middleware for LoggingMiddleware {
    fn handle(&self, request: Request, params: Params, next: Next<'_>) -> Response {
        let start = Instant::now();
        let method = request.method;
        let path = request.path.clone();
        let ip = request.ip();
        let request_id = request.header("x-request-id").unwrap_or("-").to_string();

        if self.log_headers {
            debug!(headers = ?request.headers_map(), request_id = %request_id, "Request headers");
        }

        let response = next.run(request, params);

        info!(
            method = %method,
            path = %path,
            ip = %ip,
            status = response.status,
            code = response.code,
            cost_ms = %start.elapsed().as_millis(),
            request_id = %request_id,
            "HTTP {} {}",
            method,
            path
        );
        response
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}
