//! # HTTP Request
//!
//! Immutable snapshot of one incoming call.
//!
//! The body is collected once and decoded according to the method and
//! `Content-Type`: JSON objects for `application/json`, URL-encoded form
//! fields otherwise. Only POST, PUT, PATCH and DELETE carry body parameters.

use crate::error::{Error, Result};
use crate::json::parse_json_bytes;
use crate::router::Method;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::IpAddr;
use url::form_urlencoded;

/// Fallback address when no client IP can be determined
const UNKNOWN_IP: &str = "0.0.0.0";

/// Headers consulted for the client address, in priority order
const CLIENT_IP_HEADERS: [&str; 3] = ["x-forwarded-for", "client-ip", "x-real-ip"];

/// A file received with the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field name
    pub field: String,
    /// Client-supplied file name
    pub file_name: String,
    /// Declared content type
    pub content_type: Option<String>,
    /// File contents
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Create an uploaded file record
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    /// Lower-cased extension of the client file name, if any
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// HTTP request snapshot handed to middlewares and handlers
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Normalized request path (no query string, no trailing slash)
    pub path: String,
    /// Raw query string (e.g., "page=1&limit=10")
    query_string: Option<String>,
    /// Parsed query parameters
    query_params: HashMap<String, String>,
    /// Parsed body parameters (JSON object or form fields)
    body_params: Map<String, Value>,
    /// Request headers
    headers: HeaderMap,
    /// Uploaded files
    files: Vec<UploadedFile>,
    /// Socket peer address
    remote_addr: Option<IpAddr>,
    /// Request body (collected)
    body: Option<Bytes>,
    /// Claims attached by an authentication middleware
    pub claims: Option<Value>,
}

impl Request {
    /// Create a request manually (for testing/internal use)
    ///
    /// `uri` may carry a query string.
    pub fn new(
        method: Method,
        uri: &str,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let (path, query_string) = match uri.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (uri, None),
        };

        let mut headers = HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self::from_parts(method, path, query_string, headers, body, None)
    }

    /// Shorthand for a request without headers or body
    #[must_use]
    pub fn get(uri: &str) -> Self {
        Self::new(Method::Get, uri, HashMap::new(), None)
    }

    /// Build a request carrying a JSON body
    #[must_use]
    pub fn with_json(method: Method, uri: &str, body: &Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self::new(method, uri, headers, Some(Bytes::from(body.to_string())))
    }

    fn from_parts(
        method: Method,
        path: &str,
        query_string: Option<String>,
        headers: HeaderMap,
        body: Option<Bytes>,
        remote_addr: Option<IpAddr>,
    ) -> Self {
        let query_params = parse_query_string(query_string.as_deref());
        let body_params = parse_body(method, &headers, body.as_deref());

        Self {
            method,
            path: normalize_path(path),
            query_string,
            query_params,
            body_params,
            headers,
            files: Vec::new(),
            remote_addr,
            body,
            claims: None,
        }
    }

    /// Create from hyper request with body size limit
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedMethod` for methods the router does not model
    /// and `Error::PayloadTooLarge` when the body exceeds `max_body_size`.
    pub async fn from_hyper_with_limit(
        req: hyper::Request<hyper::body::Incoming>,
        max_body_size: usize,
        remote_addr: Option<IpAddr>,
    ) -> Result<Self> {
        let method = Method::from_hyper(req.method()).ok_or_else(|| Error::UnsupportedMethod {
            method: req.method().to_string(),
        })?;

        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);

        let headers = req.headers().clone();
        if let Some(content_len) = headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
        {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let body = match BodyExt::collect(req.into_body()).await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                if bytes.len() > max_body_size {
                    return Err(Error::PayloadTooLarge {
                        limit: max_body_size,
                        actual: bytes.len(),
                    });
                }
                Some(bytes).filter(|b| !b.is_empty())
            }
            Err(e) => return Err(Error::Http(e)),
        };

        Ok(Self::from_parts(
            method,
            &path,
            query_string,
            headers,
            body,
            remote_addr,
        ))
    }

    /// Attach an uploaded file
    #[must_use]
    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.files.push(file);
        self
    }

    /// Set a header and return the request
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the socket peer address
    #[must_use]
    pub const fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Get all headers as a `HashMap` with lower-case names
    #[must_use]
    pub fn headers_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_string(), val.to_string()))
            })
            .collect()
    }

    /// Get one query parameter
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).map(String::as_str)
    }

    /// Get query parameters as a `HashMap`
    #[must_use]
    pub const fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get one body parameter
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.body_params.get(key)
    }

    /// All body parameters
    #[must_use]
    pub const fn input_map(&self) -> &Map<String, Value> {
        &self.body_params
    }

    /// Body parameter if present, otherwise the query parameter
    #[must_use]
    pub fn get_param(&self, key: &str) -> Option<Value> {
        self.body_params
            .get(key)
            .cloned()
            .or_else(|| self.query(key).map(|q| Value::String(q.to_string())))
    }

    /// Uploaded files
    #[must_use]
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    /// Client IP: forwarding headers first, then the socket peer
    #[must_use]
    pub fn ip(&self) -> String {
        for name in CLIENT_IP_HEADERS {
            if let Some(first) = self
                .header(name)
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
            {
                return first.to_string();
            }
        }
        self.remote_addr
            .map_or_else(|| UNKNOWN_IP.to_string(), |addr| addr.to_string())
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// Strip trailing slashes, keeping `/` as the minimum path
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Decode body parameters for methods that carry a body
fn parse_body(method: Method, headers: &HeaderMap, body: Option<&[u8]>) -> Map<String, Value> {
    let Some(body) = body.filter(|_| method.has_body()) else {
        return Map::new();
    };

    let content_type = headers
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("application/json") {
        let mut bytes = body.to_vec();
        return match parse_json_bytes::<Value>(&mut bytes) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
    }

    parse_urlencoded(body)
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

/// Parse query string into `HashMap`
///
/// `application/x-www-form-urlencoded` decoding; duplicate keys keep the
/// last value.
fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query.map(|q| parse_urlencoded(q.as_bytes())).unwrap_or_default()
}

fn parse_urlencoded(input: &[u8]) -> HashMap<String, String> {
    form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_query_string_simple() {
        let result = parse_query_string(Some("page=1&limit=10"));
        assert_eq!(result.get("page"), Some(&"1".to_string()));
        assert_eq!(result.get("limit"), Some(&"10".to_string()));
    }

    #[test]
    fn test_parse_query_string_empty() {
        let result = parse_query_string(None);
        assert!(result.is_empty());
    }

    #[test]
    fn test_parse_query_string_url_encoded() {
        let result = parse_query_string(Some("name=John+Doe&city=New%20York"));
        assert_eq!(result.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(result.get("city"), Some(&"New York".to_string()));
    }

    #[test]
    fn test_parse_query_string_last_duplicate_wins() {
        let result = parse_query_string(Some("a=1&a=2"));
        assert_eq!(result.get("a"), Some(&"2".to_string()));
    }

    #[test]
    fn test_percent_decoding() {
        let decoded = |q: &str| parse_query_string(Some(q)).remove("q").unwrap_or_default();
        assert_eq!(decoded("q=hello+world"), "hello world");
        assert_eq!(decoded("q=hello%20world"), "hello world");
        assert_eq!(decoded("q=100%25"), "100%");
        assert_eq!(decoded("q=%E4%BD%A0%E5%A5%BD"), "你好");
        assert_eq!(decoded("q=bad%zz"), "bad%zz");
        assert_eq!(decoded("q=trailing%2"), "trailing%2");
        assert_eq!(decoded("q=%+1"), "% 1");
        assert_eq!(decoded("q=%-f"), "%-f");

        assert_eq!(Request::get("/apis?q=%+1").query("q"), Some("% 1"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/apis/"), "/apis");
        assert_eq!(normalize_path("/apis//"), "/apis");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_new_splits_query_and_normalizes_path() {
        let req = Request::get("/apis/?page=2");
        assert_eq!(req.path, "/apis");
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query_string(), Some("page=2"));
    }

    #[test]
    fn test_json_body() {
        let req = Request::with_json(Method::Post, "/apis", &json!({"name": "x", "n": 3}));
        assert_eq!(req.input("name"), Some(&json!("x")));
        assert_eq!(req.input("n"), Some(&json!(3)));
    }

    #[test]
    fn test_invalid_json_body_is_empty() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        let req = Request::new(Method::Post, "/apis", headers, Some(Bytes::from("{nope")));
        assert!(req.input_map().is_empty());
        assert_eq!(req.body_str(), Some("{nope"));
    }

    #[test]
    fn test_non_object_json_body_is_empty() {
        let req = Request::with_json(Method::Put, "/apis/1", &json!([1, 2, 3]));
        assert!(req.input_map().is_empty());
    }

    #[test]
    fn test_form_body() {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        let req = Request::new(
            Method::Patch,
            "/apis/1",
            headers,
            Some(Bytes::from("name=a+b&tag=%23x")),
        );
        assert_eq!(req.input("name"), Some(&json!("a b")));
        assert_eq!(req.input("tag"), Some(&json!("#x")));
    }

    #[test]
    fn test_get_body_is_ignored() {
        let req = Request::with_json(Method::Get, "/apis", &json!({"name": "x"}));
        assert!(req.input_map().is_empty());
    }

    #[test]
    fn test_get_param_prefers_body() {
        let req = Request::with_json(Method::Post, "/apis?name=q&page=3", &json!({"name": "b"}));
        assert_eq!(req.get_param("name"), Some(json!("b")));
        assert_eq!(req.get_param("page"), Some(json!("3")));
        assert_eq!(req.get_param("missing"), None);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let req = Request::get("/").with_header("X-Admin-Token", "t");
        assert_eq!(req.header("x-admin-token"), Some("t"));
        assert_eq!(req.header("X-ADMIN-TOKEN"), Some("t"));
    }

    #[test]
    fn test_ip_resolution_order() {
        let peer: IpAddr = "10.0.0.9".parse().unwrap();
        let req = Request::get("/").with_remote_addr(peer);
        assert_eq!(req.ip(), "10.0.0.9");

        let req = req.with_header("x-real-ip", "10.0.0.3");
        assert_eq!(req.ip(), "10.0.0.3");

        let req = req.with_header("x-forwarded-for", "203.0.113.7, 10.0.0.1");
        assert_eq!(req.ip(), "203.0.113.7");

        assert_eq!(Request::get("/").ip(), "0.0.0.0");
    }

    #[test]
    fn test_uploaded_file_extension() {
        let file = UploadedFile::new("avatar", "Me.PNG", Bytes::from_static(b"\x89PNG"));
        assert_eq!(file.extension().as_deref(), Some("png"));
        let req = Request::get("/").with_file(file);
        assert_eq!(req.files().len(), 1);
    }
}
