//! The `apis` resource.
//!
//! Persistence is out of scope here; the actions echo what they were given
//! so the routing and validation around them can be exercised end to end.

use sangbo_core::validation::validate;
use sangbo_core::{Outcome, Params, Request, Resource};
use serde_json::{json, Value};
use tracing::info;

const STORE_RULES: &[(&str, &str)] = &[
    ("name", "required|type:string|max:200"),
    ("request_url", "required|type:string|max:200"),
];

/// RESTful controller for `/apis`
#[derive(Debug, Default)]
pub struct ApiController;

impl Resource for ApiController {
    fn index(&self, _request: &Request, _params: &Params) -> Outcome {
        json!({"list": [], "total": 0}).into()
    }

    fn store(&self, request: &Request, _params: &Params) -> Outcome {
        let errors = validate(request.input_map(), STORE_RULES);
        if !errors.is_empty() {
            return errors.into_response().into();
        }

        let name = request.input("name").cloned().unwrap_or(Value::Null);
        info!(name = %name, "Api created");
        json!({"id": 1, "name": name}).into()
    }

    fn show(&self, _request: &Request, params: &Params) -> Outcome {
        json!({"id": params.get("id")}).into()
    }

    fn update(&self, request: &Request, params: &Params) -> Outcome {
        json!({
            "updated": true,
            "id": params.get_as::<i64>("id").unwrap_or(0),
            "data": request.input_map(),
        })
        .into()
    }

    fn destroy(&self, _request: &Request, params: &Params) -> Outcome {
        json!({"deleted": true, "id": params.get_as::<i64>("id").unwrap_or(0)}).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sangbo_core::Method;

    #[test]
    fn test_store_echoes_submitted_name() {
        let request = Request::with_json(
            Method::Post,
            "/apis",
            &json!({"name": "<b>demo</b>", "request_url": "https://example.com"}),
        );
        let response = ApiController.store(&request, &Params::new()).into_response();
        assert_eq!(response.status, 200);
        assert_eq!(response.data, json!({"id": 1, "name": "<b>demo</b>"}));
    }

    #[test]
    fn test_store_reports_every_missing_field() {
        let request = Request::with_json(Method::Post, "/apis", &json!({}));
        let response = ApiController.store(&request, &Params::new()).into_response();
        assert_eq!(response.code, 422);
        assert!(response.data["errors"]["name"].is_array());
        assert!(response.data["errors"]["request_url"].is_array());
    }

    #[test]
    fn test_update_non_numeric_id() {
        let mut params = Params::new();
        params.insert("id", "abc");
        let request = Request::with_json(Method::Put, "/apis/abc", &json!({"name": "x"}));
        let response = ApiController.update(&request, &params).into_response();
        assert_eq!(response.data["id"], 0);
        assert_eq!(response.data["data"], json!({"name": "x"}));
    }
}
