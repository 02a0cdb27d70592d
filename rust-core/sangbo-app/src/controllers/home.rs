use sangbo_core::helper::{format_datetime, DATETIME_FORMAT};
use sangbo_core::{AppContext, Params, Request};
use serde_json::{json, Value};
use std::sync::Arc;

/// Public landing endpoints
pub struct HomeController {
    ctx: Arc<AppContext>,
}

impl HomeController {
    /// Controller bound to the shared application context
    pub const fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// `GET /`
    pub fn index(&self, _request: &Request, _params: &Params) -> Value {
        json!({
            "app": self.ctx.config().name,
            "time": format_datetime(None, DATETIME_FORMAT),
        })
    }

    /// `GET /ping`
    pub fn ping(&self, _request: &Request, _params: &Params) -> Value {
        json!({"pong": true})
    }
}
