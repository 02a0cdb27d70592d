//! # Response Envelope
//!
//! Every outward-facing result is rendered as the uniform envelope
//! `{"code": int, "message": string, "data": any}`.
//!
//! The domain `code` and the transport `status` are independent fields: the
//! built-in constructors keep them equal for errors, but a handler is free to
//! diverge (e.g. domain 1001 with HTTP 200).

use crate::error::Error;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Content type used for every envelope
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Domain code of a successful response
pub const SUCCESS_CODE: i64 = 0;

/// Serialized shape of a response body
#[derive(Serialize)]
struct Envelope<'a> {
    code: i64,
    message: &'a str,
    data: &'a Value,
}

/// Uniform API response
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Domain-level status code (`0` on success)
    pub code: i64,
    /// Human-readable message
    pub message: String,
    /// Payload
    pub data: Value,
    /// HTTP status code
    pub status: u16,
    /// Extra response headers (Content-Type is always the JSON type)
    pub headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self::json(Value::Null)
    }
}

impl Response {
    /// Create a response with every envelope field explicit
    pub fn new(data: Value, code: i64, message: impl Into<String>, status: u16) -> Self {
        Self {
            code,
            message: message.into(),
            data,
            status,
            headers: HashMap::new(),
        }
    }

    /// Create a success response (`code: 0`, `message: "success"`, HTTP 200)
    #[must_use]
    pub fn json(data: Value) -> Self {
        Self::new(data, SUCCESS_CODE, "success", 200)
    }

    /// Create an error response whose domain code equals its HTTP status
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::new(Value::Null, i64::from(code), message, code)
    }

    /// The 404 envelope returned when no route matches
    #[must_use]
    pub fn not_found() -> Self {
        Self::error(404, "Not Found")
    }

    /// Map an [`Error`] onto the envelope using its domain code and status
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        Self::new(Value::Null, err.code(), err.to_string(), err.http_status())
    }

    /// Replace the payload
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header (names compare case-insensitively)
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            return;
        }
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(key));
        self.headers.insert(key.to_string(), value.to_string());
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the domain code signals success
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// The envelope as a JSON value
    #[must_use]
    pub fn envelope(&self) -> Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "data": self.data,
        })
    }

    /// Render the envelope body (UTF-8, non-ASCII left unescaped)
    #[must_use]
    pub fn to_body(&self) -> String {
        let envelope = Envelope {
            code: self.code,
            message: &self.message,
            data: &self.data,
        };
        serde_json::to_string(&envelope).unwrap_or_else(|_| {
            r#"{"code":500,"message":"Response serialization failed","data":null}"#.to_string()
        })
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Self::from_error(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_defaults() {
        let resp = Response::json(json!({"pong": true}));
        assert_eq!(resp.code, 0);
        assert_eq!(resp.message, "success");
        assert_eq!(resp.status, 200);
        assert!(resp.is_success());
    }

    #[test]
    fn test_not_found_envelope() {
        let resp = Response::not_found();
        assert_eq!(resp.code, 404);
        assert_eq!(resp.status, 404);
        assert_eq!(
            resp.to_body(),
            r#"{"code":404,"message":"Not Found","data":null}"#
        );
    }

    #[test]
    fn test_body_keeps_non_ascii() {
        let resp = Response::json(json!({"message": "欢迎进入后台"}));
        assert!(resp.to_body().contains("欢迎进入后台"));
    }

    #[test]
    fn test_domain_code_independent_of_status() {
        let resp = Response::new(Value::Null, 1001, "quota exhausted", 200);
        let envelope = resp.envelope();
        assert_eq!(envelope["code"], 1001);
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut resp = Response::json(Value::Null).with_header("X-Request-Id", "abc");
        resp.set_header("x-request-id", "def");
        assert_eq!(resp.header("X-REQUEST-ID"), Some("def"));
        assert_eq!(resp.headers.len(), 1);
    }

    #[test]
    fn test_content_type_not_overridable() {
        let resp = Response::json(Value::Null).with_header("Content-Type", "text/plain");
        assert!(resp.header("content-type").is_none());
    }

    #[test]
    fn test_from_database_error() {
        let resp = Response::from(Error::Database {
            message: "down".to_string(),
        });
        assert_eq!(resp.code, 503);
        assert_eq!(resp.status, 503);
        assert!(resp.message.contains("down"));
    }
}
