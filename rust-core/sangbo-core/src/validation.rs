//! # Validation Module
//!
//! Rule-string validation of request input and structured errors.
//!
//! Rules are `|`-separated, optionally parameterized with `:`:
//!
//! ```text
//! name        => required|type:string|max:200
//! email       => required|email
//! homepage    => url
//! ```
//!
//! Every rule of a field is evaluated in declared order, so one field may
//! collect several messages. Unknown rules are ignored.

use crate::response::Response;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing
    Required,
    /// Value is invalid type
    InvalidType,
    /// Value is too short
    TooShort,
    /// Value is too long
    TooLong,
    /// Value doesn't match the expected format (email, URL)
    InvalidFormat,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name (e.g., "email")
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a "required field" error
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("{field} is required");
        Self::new(field, message, ValidationCode::Required)
    }

    /// Create an "invalid type" error; `expected` reads like "an integer"
    pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
        let field = field.into();
        let message = format!("{field} must be {expected}");
        Self::new(field, message, ValidationCode::InvalidType)
    }

    /// Create a "too short" error
    pub fn too_short(field: impl Into<String>, min: usize) -> Self {
        let field = field.into();
        let message = format!("{field} must be at least {min} characters");
        Self::new(field, message, ValidationCode::TooShort)
    }

    /// Create a "too long" error
    pub fn too_long(field: impl Into<String>, max: usize) -> Self {
        let field = field.into();
        let message = format!("{field} must be at most {max} characters");
        Self::new(field, message, ValidationCode::TooLong)
    }

    /// Create an "invalid format" error; `what` reads like "a valid URL"
    pub fn invalid_format(field: impl Into<String>, what: &str) -> Self {
        let field = field.into();
        let message = format!("{field} must be {what}");
        Self::new(field, message, ValidationCode::InvalidFormat)
    }
}

/// Collection of validation errors, in the order they were found
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    /// List of field-level errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Messages grouped by field
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            map.entry(error.field.clone())
                .or_default()
                .push(error.message.clone());
        }
        map
    }

    /// The 422 envelope: `{code: 422, message: "Validation failed", data: {errors}}`
    #[must_use]
    pub fn into_response(self) -> Response {
        Response::error(422, "Validation failed").with_data(json!({ "errors": self.to_map() }))
    }

    /// `Ok(())` when empty, the errors otherwise
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one rule failed.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

/// Validate `data` against `(field, rules)` pairs
#[must_use]
pub fn validate(data: &Map<String, Value>, rules: &[(&str, &str)]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for (field, rule_str) in rules {
        let value = data.get(*field).filter(|v| !v.is_null());
        for rule in rule_str.split('|').map(str::trim).filter(|r| !r.is_empty()) {
            let (name, param) = rule.split_once(':').unwrap_or((rule, ""));
            if let Some(error) = check_rule(field, value, name, param) {
                errors.add(error);
            }
        }
    }
    errors
}

fn check_rule(field: &str, value: Option<&Value>, name: &str, param: &str) -> Option<FieldError> {
    let text = value.and_then(Value::as_str);
    match name {
        "required" => (value.is_none() || text == Some("")).then(|| FieldError::required(field)),
        "type" => match param {
            "int" => (!value.is_some_and(is_integer))
                .then(|| FieldError::invalid_type(field, "an integer")),
            "string" => (text.is_none()).then(|| FieldError::invalid_type(field, "a string")),
            "array" => (!value.is_some_and(|v| v.is_array() || v.is_object()))
                .then(|| FieldError::invalid_type(field, "an array")),
            _ => None,
        },
        "max" => {
            let max = param.parse::<usize>().unwrap_or(0);
            text.filter(|s| s.chars().count() > max)
                .map(|_| FieldError::too_long(field, max))
        }
        "min" => {
            let min = param.parse::<usize>().unwrap_or(0);
            text.filter(|s| s.chars().count() < min)
                .map(|_| FieldError::too_short(field, min))
        }
        "email" => text
            .filter(|s| !s.is_empty() && !is_email(s))
            .map(|_| FieldError::invalid_format(field, "a valid email address")),
        "url" => text
            .filter(|s| !s.is_empty() && !is_url(s))
            .map(|_| FieldError::invalid_format(field, "a valid URL")),
        _ => None,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

/// Check an address of the form `local@domain.tld`
#[must_use]
pub fn is_email(value: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(
                r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$",
            )
            .ok()
        })
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

/// Check an absolute URL with a host
#[must_use]
pub fn is_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| u.has_host())
}

/// Strip SQL keywords, statement separators, comments, backslashes and quotes
///
/// Parameter binding is the real protection; this is a last-resort filter.
#[must_use]
pub fn clean_sql(value: &str) -> String {
    static SQL: OnceLock<Option<Regex>> = OnceLock::new();
    SQL.get_or_init(|| {
        Regex::new(r"(?i)(select|insert|update|delete|drop|truncate|;|--|\\|')").ok()
    })
    .as_ref()
    .map_or_else(|| value.to_string(), |re| re.replace_all(value, "").into_owned())
}

/// Remove HTML tags, then HTML-escape what remains
#[must_use]
pub fn clean_xss(value: &str) -> String {
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    let stripped = TAGS
        .get_or_init(|| Regex::new(r"(?s)<[^>]*>").ok())
        .as_ref()
        .map_or_else(|| value.to_string(), |re| re.replace_all(value, "").into_owned());

    let mut escaped = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
