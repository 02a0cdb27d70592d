//! # Sangbo Core
//!
//! Core library for the Sangbo micro-framework: an ordered router with
//! RESTful helpers, a chain-of-responsibility middleware pipeline and a
//! uniform `{code, message, data}` response envelope, plus the small
//! collaborators controllers lean on.
//!
//! ## Architecture
//!
//! ```text
//! hyper request → Request → Router::dispatch → [mw₁ → mw₂ → handler] → Response → envelope
//! ```
//!
//! The route table and registry are built once at startup and then shared
//! immutably behind an `Arc`; dispatch runs inside each connection task.
//!
//! ## Modules
//!
//! - `router` - Route table, first-match dispatch, RESTful expansion
//! - `route` - Pattern compilation and route metadata
//! - `handler` - Handler targets, result normalization, resources
//! - `registry` - Named handlers and middlewares
//! - `middleware` - Middleware trait, continuation, request logging
//! - `auth` - Token and CSRF middlewares
//! - `request` - HTTP request snapshot with query/body parsing
//! - `response` - Response envelope
//! - `validation` - Rule-string validation and input cleaning
//! - `cache` - File-backed cache
//! - `database` - SQLx database connectivity (SQLite, PostgreSQL)
//! - `helper` - Passwords, random strings, dates, uploads
//! - `config` - TOML configuration
//! - `context` - Startup-built application resources
//! - `logger` - Tracing subscriber installation
//! - `server` - HTTP server built on Hyper
//! - `json` - JSON parsing with simd-json
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod handler;
pub mod helper;
pub mod json;
pub mod logger;
pub mod middleware;
pub mod registry;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod validation;

pub use auth::{AuthMiddleware, CsrfMiddleware};
pub use cache::FileCache;
pub use config::{AppConfig, DatabaseConfig, LogConfig, SecurityConfig, ServerSettings};
pub use context::AppContext;
pub use database::{DatabasePool, DbRow, DbTransaction, DbValue};
pub use error::{Error, Result};
pub use handler::{handler, Action, BoxedHandler, Outcome, Resource, Target};
pub use json::{parse_json, to_json};
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareRef, Next};
pub use registry::Registry;
pub use request::{Request, UploadedFile};
pub use response::Response;
pub use route::{Params, Route};
pub use router::{Match, Method, Resolution, Router};
pub use server::{Server, ServerConfig};
pub use validation::{validate, FieldError, ValidationCode, ValidationErrors, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
