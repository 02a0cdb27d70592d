//! # Access-control middlewares
//!
//! [`AuthMiddleware`] guards routes behind a token header, optionally
//! verified as an HS256 JWT. [`CsrfMiddleware`] rejects state-changing
//! requests without a CSRF token.

use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;
use crate::route::Params;
use crate::router::Method;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::warn;

/// Header carrying the admin token unless configured otherwise
pub const DEFAULT_TOKEN_HEADER: &str = "x-admin-token";

/// Header carrying the CSRF token
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Authentication Configuration (JWT)
#[derive(Clone)]
pub struct AuthConfig {
    /// JWT decoding key
    pub decoding_key: DecodingKey,
    /// JWT validation settings
    pub validation: Validation,
}

impl AuthConfig {
    /// Create auth config from shared secret
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

/// Requires a token header; verifies it as a JWT when a secret is configured
pub struct AuthMiddleware {
    header: String,
    config: Option<AuthConfig>,
}

impl Default for AuthMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMiddleware {
    /// Presence check on `x-admin-token`
    #[must_use]
    pub fn new() -> Self {
        Self {
            header: DEFAULT_TOKEN_HEADER.to_string(),
            config: None,
        }
    }

    /// Verify tokens as HS256 JWTs signed with `secret`
    #[must_use]
    pub fn with_secret(mut self, secret: &str) -> Self {
        self.config = Some(AuthConfig::new(secret));
        self
    }

    /// Read the token from another header
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    fn token<'r>(&self, request: &'r Request) -> Option<&'r str> {
        request
            .header(&self.header)
            .map(|raw| raw.strip_prefix("Bearer ").unwrap_or(raw).trim())
            .filter(|t| !t.is_empty())
    }
}

impl Middleware for AuthMiddleware {
    fn handle(&self, mut request: Request, params: Params, next: Next<'_>) -> Response {
        let Some(token) = self.token(&request).map(str::to_string) else {
            return Response::error(401, "Unauthorized");
        };

        if let Some(config) = &self.config {
            match decode::<serde_json::Value>(&token, &config.decoding_key, &config.validation) {
                Ok(token_data) => request.claims = Some(token_data.claims),
                Err(e) => {
                    warn!(path = %request.path, "JWT validation failed: {}", e);
                    return Response::error(401, "Unauthorized");
                }
            }
        }

        next.run(request, params)
    }

    fn name(&self) -> &'static str {
        "AuthMiddleware"
    }
}

/// Rejects non-safe methods that carry no (or the wrong) CSRF token
#[derive(Default)]
pub struct CsrfMiddleware {
    expected: Option<String>,
}

impl CsrfMiddleware {
    /// Presence check on `x-csrf-token`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the token to equal `token`
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.expected = Some(token.into());
        self
    }

    fn accepts(&self, token: Option<&str>) -> bool {
        match (token, &self.expected) {
            (None | Some(""), _) => false,
            (Some(given), Some(expected)) => {
                constant_time_eq(given.as_bytes(), expected.as_bytes())
            }
            (Some(_), None) => true,
        }
    }
}

impl Middleware for CsrfMiddleware {
    fn handle(&self, request: Request, params: Params, next: Next<'_>) -> Response {
        let safe = matches!(request.method, Method::Get | Method::Head | Method::Options);
        if !safe && !self.accepts(request.header(CSRF_HEADER)) {
            warn!(method = %request.method, path = %request.path, "CSRF check failed");
            return Response::error(419, "CSRF token mismatch");
        }
        next.run(request, params)
    }

    fn name(&self) -> &'static str {
        "CsrfMiddleware"
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{boxed, Endpoint};
    use crate::middleware::MiddlewareRef;
    use crate::registry::Registry;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn run(mw: impl Middleware + 'static, request: Request) -> Response {
        let registry = Registry::new();
        let endpoint = Endpoint::Resolved(boxed(|req: &Request, _p: &Params| {
            json!({"claims": req.claims.clone()})
        }));
        let chain = [MiddlewareRef::new(mw)];
        Next::new(&chain, &endpoint, &registry).run(request, Params::new())
    }

    fn jwt(secret: &str) -> String {
        let exp = chrono::Utc::now().timestamp() + 3600;
        encode(
            &Header::default(),
            &json!({"sub": "admin", "exp": exp}),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_auth_missing_token() {
        let response = run(AuthMiddleware::new(), Request::get("/admin"));
        assert_eq!(response.code, 401);
        assert_eq!(response.status, 401);
    }

    #[test]
    fn test_auth_presence_only() {
        let request = Request::get("/admin").with_header("x-admin-token", "anything");
        let response = run(AuthMiddleware::new(), request);
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_auth_valid_jwt_attaches_claims() {
        let request = Request::get("/admin").with_header("x-admin-token", &jwt("s3cret"));
        let response = run(AuthMiddleware::new().with_secret("s3cret"), request);
        assert_eq!(response.status, 200);
        assert_eq!(response.data["claims"]["sub"], "admin");
    }

    #[test]
    fn test_auth_rejects_foreign_jwt() {
        let request = Request::get("/admin").with_header("x-admin-token", &jwt("other"));
        let response = run(AuthMiddleware::new().with_secret("s3cret"), request);
        assert_eq!(response.status, 401);
    }

    #[test]
    fn test_auth_bearer_prefix_and_custom_header() {
        let request =
            Request::get("/admin").with_header("authorization", &format!("Bearer {}", jwt("k")));
        let mw = AuthMiddleware::new().with_header("authorization").with_secret("k");
        assert_eq!(run(mw, request).status, 200);
    }

    #[test]
    fn test_csrf_allows_safe_methods() {
        let response = run(CsrfMiddleware::new(), Request::get("/apis"));
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_csrf_rejects_missing_token() {
        let request = Request::with_json(Method::Post, "/apis", &json!({}));
        let response = run(CsrfMiddleware::new(), request);
        assert_eq!(response.code, 419);
        assert_eq!(response.status, 419);
    }

    #[test]
    fn test_csrf_expected_token() {
        let ok = Request::with_json(Method::Delete, "/apis/1", &json!({}))
            .with_header(CSRF_HEADER, "abc");
        assert_eq!(run(CsrfMiddleware::new().with_token("abc"), ok).status, 200);

        let bad = Request::with_json(Method::Delete, "/apis/1", &json!({}))
            .with_header(CSRF_HEADER, "abd");
        assert_eq!(run(CsrfMiddleware::new().with_token("abc"), bad).status, 419);
    }
}
