//! # Error Handling
//!
//! Centralized error types for Sangbo core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Errors fall in two groups: startup errors (bad route patterns, unresolved
//! names, configuration, bind failures) which propagate to `main`, and
//! request-time errors which are turned into envelope responses through
//! [`Error::code`] and [`Error::http_status`].

use thiserror::Error;

/// Result type alias for Sangbo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Sangbo framework
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Invalid route pattern provided at registration
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A named handler reference is not present in the registry
    #[error("Handler not found: {reference}")]
    UnresolvedHandler {
        /// The handler name that failed to resolve
        reference: String,
    },

    /// A named middleware reference is not present in the registry
    #[error("Middleware not found: {reference}")]
    UnresolvedMiddleware {
        /// The middleware name that failed to resolve
        reference: String,
    },

    /// HTTP method the router does not model
    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod {
        /// The raw method token
        method: String,
    },

    /// Request body could not be decoded
    #[error("Invalid request body: {reason}")]
    InvalidBody {
        /// Decoder message
        reason: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or is semantically invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Database error
    #[error("Database error: {message}")]
    Database {
        /// Error message from database
        message: String,
    },

    /// Cache storage error
    #[error("Cache error: {message}")]
    Cache {
        /// Error message from the cache layer
        message: String,
    },

    /// Uploaded file was rejected or could not be stored
    #[error("Upload error: {message}")]
    Upload {
        /// Reason for the rejection
        message: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },
}

impl Error {
    /// Domain code carried in the response envelope for this error
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::UnsupportedMethod { .. } => 404,
            Self::InvalidBody { .. } | Self::Json(_) => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::Upload { .. } => 422,
            Self::Database { .. } => 503,
            _ => 500,
        }
    }

    /// HTTP status used when this error reaches the transport boundary
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub const fn http_status(&self) -> u16 {
        // Domain and transport codes coincide for every built-in error.
        self.code() as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_handler_error() {
        let err = Error::UnresolvedHandler {
            reference: "ApiController@show".to_string(),
        };
        assert!(err.to_string().contains("ApiController@show"));
        assert_eq!(err.code(), 500);
    }

    #[test]
    fn test_bind_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = Error::BindError {
            address: "0.0.0.0:8000".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("0.0.0.0:8000"));
    }

    #[test]
    fn test_database_error_is_distinct_from_internal() {
        let err = Error::Database {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.code(), 503);
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn test_payload_too_large_status() {
        let err = Error::PayloadTooLarge {
            limit: 10,
            actual: 20,
        };
        assert_eq!(err.http_status(), 413);
    }
}
