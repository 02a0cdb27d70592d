//! # Handler Registry
//!
//! Name → handler and name → middleware tables owned by a router.
//!
//! Routes may point at names (`"HomeController@ping"`, `"auth"`) instead of
//! values. With eager resolution the router looks names up once at
//! registration; with deferred resolution every dispatch looks them up here.

use crate::handler::{boxed, resource_action, Action, BoxedHandler, Outcome, Resource};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::route::Params;
use std::collections::HashMap;
use std::sync::Arc;

/// Named handlers and middlewares
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, BoxedHandler>,
    middlewares: HashMap<String, Arc<dyn Middleware>>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler function under `name`
    ///
    /// Overwrites any existing handler with the same name.
    pub fn handler<F, R>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
        R: Into<Outcome>,
    {
        self.handlers.insert(name.into(), boxed(f));
        self
    }

    /// Register an already boxed handler
    pub fn insert_handler(&mut self, name: impl Into<String>, handler: BoxedHandler) -> &mut Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Register every action of a resource as `"{name}@{action}"`
    pub fn resource<R: Resource>(&mut self, name: &str, resource: Arc<R>) -> &mut Self {
        for action in Action::ALL {
            self.handlers.insert(
                format!("{name}@{action}"),
                resource_action(&resource, action),
            );
        }
        self
    }

    /// Register a middleware under `name`
    pub fn middleware<M: Middleware + 'static>(
        &mut self,
        name: impl Into<String>,
        middleware: M,
    ) -> &mut Self {
        self.middlewares.insert(name.into(), Arc::new(middleware));
        self
    }

    /// Register a shared middleware instance
    pub fn insert_middleware(
        &mut self,
        name: impl Into<String>,
        middleware: Arc<dyn Middleware>,
    ) -> &mut Self {
        self.middlewares.insert(name.into(), middleware);
        self
    }

    /// Look up a handler
    #[must_use]
    pub fn handler_by_name(&self, name: &str) -> Option<&BoxedHandler> {
        self.handlers.get(name)
    }

    /// Look up a middleware
    #[must_use]
    pub fn middleware_by_name(&self, name: &str) -> Option<&Arc<dyn Middleware>> {
        self.middlewares.get(name)
    }

    /// Number of named handlers
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Number of named middlewares
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        let mut middlewares: Vec<_> = self.middlewares.keys().collect();
        middlewares.sort();
        f.debug_struct("Registry")
            .field("handlers", &handlers)
            .field("middlewares", &middlewares)
            .finish()
    }
}
