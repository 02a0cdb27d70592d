//! Route tables for the two entrypoints.
//!
//! Both tables share one registry: controllers are registered by
//! `Controller@action` name and middlewares by short alias, then the route
//! lists refer to them by name. Names are resolved when the table is built,
//! so a typo fails startup instead of a request.

use crate::controllers::{ApiController, DashboardController, HomeController};
use clap::ValueEnum;
use sangbo_core::{
    AppContext, AuthMiddleware, CsrfMiddleware, LoggingMiddleware, MiddlewareRef, Params, Registry,
    Request, Result, Router,
};
use std::fmt;
use std::sync::Arc;

/// Which route table to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Entry {
    /// Public site and API
    #[default]
    Frontend,
    /// Admin console
    Admin,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frontend => f.write_str("frontend"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

/// Named handlers and middlewares available to both tables
pub fn build_registry(ctx: &Arc<AppContext>) -> Registry {
    let mut registry = Registry::new();

    let home = Arc::new(HomeController::new(Arc::clone(ctx)));
    let index = Arc::clone(&home);
    registry.handler("HomeController@index", move |req: &Request, p: &Params| index.index(req, p));
    registry.handler("HomeController@ping", move |req: &Request, p: &Params| home.ping(req, p));
    registry.handler("DashboardController@index", |req: &Request, p: &Params| {
        DashboardController.index(req, p)
    });
    registry.resource("ApiController", Arc::new(ApiController));

    let security = &ctx.config().security;
    let auth = match &security.jwt_secret {
        Some(secret) => AuthMiddleware::new().with_secret(secret),
        None => AuthMiddleware::new(),
    };
    let csrf = match &security.csrf_token {
        Some(token) => CsrfMiddleware::new().with_token(token.clone()),
        None => CsrfMiddleware::new(),
    };

    registry
        .middleware("log", LoggingMiddleware::new())
        .middleware("auth", auth)
        .middleware("csrf", csrf);
    registry
}

fn chain(names: &[&str]) -> Vec<MiddlewareRef> {
    names.iter().map(|&name| MiddlewareRef::from(name)).collect()
}

/// Public routes
///
/// # Errors
///
/// Fails if a route names a handler or middleware missing from the registry.
pub fn frontend(ctx: &Arc<AppContext>) -> Result<Router> {
    let mut router = Router::with_registry(build_registry(ctx));
    router.get("/", "HomeController@index", &[])?;
    router.get("/ping", "HomeController@ping", &[])?;
    router.restful("/apis", "ApiController", &chain(&["log"]))?;
    Ok(router)
}

/// Admin routes, all behind the token check
///
/// # Errors
///
/// Fails if a route names a handler or middleware missing from the registry.
pub fn admin(ctx: &Arc<AppContext>) -> Result<Router> {
    let mut router = Router::with_registry(build_registry(ctx));
    router.get("/admin", "DashboardController@index", &chain(&["log", "auth"]))?;
    router.restful("/admin/apis", "ApiController", &chain(&["log", "auth", "csrf"]))?;
    Ok(router)
}

/// Route table for `entry`
///
/// # Errors
///
/// See [`frontend`] and [`admin`].
pub fn build(entry: Entry, ctx: &Arc<AppContext>) -> Result<Router> {
    match entry {
        Entry::Frontend => frontend(ctx),
        Entry::Admin => admin(ctx),
    }
}
