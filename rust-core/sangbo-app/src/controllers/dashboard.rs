use sangbo_core::{Params, Request};
use serde_json::{json, Value};

/// Admin console landing page
pub struct DashboardController;

impl DashboardController {
    /// `GET /admin`
    pub fn index(&self, _request: &Request, _params: &Params) -> Value {
        json!({"admin": true, "message": "Welcome to the admin console"})
    }
}
