//! # Route Metadata
//!
//! Pattern compilation and the immutable [`Route`] record.
//!
//! A pattern is a path template with `{name}` placeholders. Each placeholder
//! captures one non-empty path segment; everything else matches literally.

use crate::error::{Error, Result};
use crate::handler::Endpoint;
use crate::middleware::MiddlewareRef;
use crate::request::normalize_path;
use crate::router::Method;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;

/// Path parameters extracted from a matched route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    /// Create an empty parameter map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a parameter by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parse a parameter into any `FromStr` type
    ///
    /// Returns `None` if the parameter is absent or does not parse.
    #[must_use]
    pub fn get_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Check if a parameter exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Consume into the underlying map
    #[must_use]
    pub fn into_inner(self) -> HashMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A route pattern compiled to an anchored regex
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// Pattern as registered (e.g., "/apis/{id}")
    source: String,
    /// Anchored matcher
    regex: Regex,
    /// Placeholder names in order of appearance
    param_names: Vec<String>,
}

impl CompiledPattern {
    /// Compile a path template
    ///
    /// Literal text is escaped, `{name}` becomes a named group matching
    /// `[^/]+`, and trailing slashes are dropped (`/` stays `/`).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for an unclosed or stray brace,
    /// an invalid placeholder name, or a repeated placeholder name.
    pub fn compile(pattern: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidRoutePattern {
            pattern: pattern.to_string(),
            reason,
        };

        let normalized = normalize_path(pattern);
        let mut expr = String::from("^");
        let mut param_names: Vec<String> = Vec::new();
        let mut rest = normalized.as_str();

        while let Some(open) = rest.find('{') {
            let literal = &rest[..open];
            if literal.contains('}') {
                return Err(invalid("unmatched '}'".to_string()));
            }
            expr.push_str(&regex::escape(literal));

            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| invalid("unclosed placeholder".to_string()))?;
            let name = &after[..close];

            if !is_param_name(name) {
                return Err(invalid(format!("invalid parameter name '{name}'")));
            }
            if param_names.iter().any(|n| n == name) {
                return Err(invalid(format!("duplicate parameter '{name}'")));
            }

            let _ = write!(expr, "(?P<{name}>[^/]+)");
            param_names.push(name.to_string());
            rest = &after[close + 1..];
        }

        if rest.contains('}') {
            return Err(invalid("unmatched '}'".to_string()));
        }
        expr.push_str(&regex::escape(rest));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            param_names,
        })
    }

    /// Pattern as registered
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled regular expression
    #[must_use]
    pub fn as_regex(&self) -> &str {
        self.regex.as_str()
    }

    /// Placeholder names in order of appearance
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a normalized path and extract its parameters
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        Some(
            self.param_names
                .iter()
                .filter_map(|name| caps.name(name).map(|m| (name.as_str(), m.as_str())))
                .collect(),
        )
    }
}

fn is_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A registered route. Immutable once added to a router.
#[derive(Clone)]
pub struct Route {
    /// HTTP method
    pub method: Method,
    /// Compiled path matcher
    pattern: CompiledPattern,
    /// Terminal handler
    pub(crate) endpoint: Endpoint,
    /// Middlewares, outermost first
    pub(crate) middlewares: Vec<MiddlewareRef>,
}

impl Route {
    pub(crate) fn new(
        method: Method,
        pattern: CompiledPattern,
        endpoint: Endpoint,
        middlewares: Vec<MiddlewareRef>,
    ) -> Self {
        Self {
            method,
            pattern,
            endpoint,
            middlewares,
        }
    }

    /// Pattern as registered (e.g., "/apis/{id}")
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.source()
    }

    /// Placeholder names of this route
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        self.pattern.param_names()
    }

    /// Middleware names in execution order
    #[must_use]
    pub fn middleware_names(&self) -> Vec<String> {
        self.middlewares.iter().map(MiddlewareRef::label).collect()
    }

    pub(crate) fn matches(&self, path: &str) -> Option<Params> {
        self.pattern.matches(path)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.source())
            .field("middlewares", &self.middleware_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_static() {
        let p = CompiledPattern::compile("/ping").unwrap();
        assert_eq!(p.as_regex(), "^/ping$");
        assert!(p.param_names().is_empty());
        assert_eq!(p.matches("/ping"), Some(Params::new()));
        assert_eq!(p.matches("/ping/x"), None);
    }

    #[test]
    fn test_compile_single_param() {
        let p = CompiledPattern::compile("/apis/{id}").unwrap();
        assert_eq!(p.as_regex(), "^/apis/(?P<id>[^/]+)$");
        let params = p.matches("/apis/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get_as::<i64>("id"), Some(42));
    }

    #[test]
    fn test_params_do_not_span_segments() {
        let p = CompiledPattern::compile("/apis/{id}").unwrap();
        assert_eq!(p.matches("/apis/4/2"), None);
        assert_eq!(p.matches("/apis/"), None);
    }

    #[test]
    fn test_multiple_params_positional() {
        let p = CompiledPattern::compile("/users/{user_id}/posts/{post_id}").unwrap();
        assert_eq!(p.param_names(), ["user_id", "post_id"]);
        let params = p.matches("/users/456/posts/789").unwrap();
        assert_eq!(params.get("user_id"), Some("456"));
        assert_eq!(params.get("post_id"), Some("789"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_param_names_match_capture_groups() {
        let p = CompiledPattern::compile("/a/{x}/b/{_y2}").unwrap();
        let groups: Vec<_> = p.regex.capture_names().flatten().collect();
        assert_eq!(groups, p.param_names());
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let p = CompiledPattern::compile("/apis/").unwrap();
        assert_eq!(p.as_regex(), "^/apis$");
        assert_eq!(p.source(), "/apis/");
    }

    #[test]
    fn test_root_pattern() {
        let p = CompiledPattern::compile("/").unwrap();
        assert_eq!(p.matches("/"), Some(Params::new()));
    }

    #[test]
    fn test_literals_are_escaped() {
        let p = CompiledPattern::compile("/files/report.v1").unwrap();
        assert!(p.matches("/files/report.v1").is_some());
        assert!(p.matches("/files/reportXv1").is_none());

        let p = CompiledPattern::compile("/a+b/(c)").unwrap();
        assert!(p.matches("/a+b/(c)").is_some());
        assert!(p.matches("/aab/c").is_none());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            CompiledPattern::compile("/apis/{id"),
            Err(Error::InvalidRoutePattern { .. })
        ));
        assert!(CompiledPattern::compile("/apis/id}").is_err());
        assert!(CompiledPattern::compile("/apis/{1id}").is_err());
        assert!(CompiledPattern::compile("/apis/{}").is_err());
        assert!(CompiledPattern::compile("/apis/{id:int}").is_err());
        assert!(CompiledPattern::compile("/{id}/x/{id}").is_err());
    }

    #[test]
    fn test_params_from_iter() {
        let params: Params = [("id", "1"), ("slug", "a")].into_iter().collect();
        assert!(params.contains("slug"));
        assert_eq!(params.iter().count(), 2);
        assert_eq!(params.get_as::<u32>("slug"), None);
    }
}
