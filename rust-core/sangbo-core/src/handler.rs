//! # Handlers
//!
//! A handler is any `Fn(&Request, &Params) -> R` where `R: Into<Outcome>`.
//! Returning a [`Response`] passes it through untouched; returning any other
//! value wraps it as the `data` of a success envelope.
//!
//! Handlers are stored type-erased as [`BoxedHandler`] so routes with
//! different closure types can share one table:
//!
//! ```text
//! |req, params| json!({...})        ← user writes this
//!        ↓ handler(f)
//! Arc<dyn Fn(&Request, &Params) -> Outcome>
//!        ↓ at dispatch
//! Outcome::into_response()
//! ```

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::route::Params;
use crate::router::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

/// A heap-allocated, type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Fn(&Request, &Params) -> Outcome + Send + Sync + 'static>;

/// What a handler produced, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A fully-formed response, passed through unchanged
    Response(Response),
    /// A raw value, wrapped as a success payload
    Data(Value),
}

impl Outcome {
    /// Normalize into a response envelope
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::Response(response) => response,
            Self::Data(data) => Response::json(data),
        }
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Value> for Outcome {
    fn from(data: Value) -> Self {
        Self::Data(data)
    }
}

impl From<()> for Outcome {
    fn from((): ()) -> Self {
        Self::Data(Value::Null)
    }
}

impl<T: Into<Self>> From<Result<T, Error>> for Outcome {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => {
                error!(error = %err, "Handler failed");
                Self::Response(Response::from_error(&err))
            }
        }
    }
}

/// Erase a handler function
pub fn boxed<F, R>(f: F) -> BoxedHandler
where
    F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
    R: Into<Outcome>,
{
    Arc::new(move |request: &Request, params: &Params| f(request, params).into())
}

/// Build a route target from a handler function
pub fn handler<F, R>(f: F) -> Target
where
    F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
    R: Into<Outcome>,
{
    Target::Handler(boxed(f))
}

/// What a route points at
#[derive(Clone)]
pub enum Target {
    /// A handler function value
    Handler(BoxedHandler),
    /// A name looked up in the router's [`crate::Registry`]
    Named(String),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Target::Handler(..)"),
            Self::Named(name) => f.debug_tuple("Target::Named").field(name).finish(),
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<BoxedHandler> for Target {
    fn from(handler: BoxedHandler) -> Self {
        Self::Handler(handler)
    }
}

/// Terminal link of a middleware chain
#[derive(Clone)]
pub(crate) enum Endpoint {
    /// Resolved when the route was registered
    Resolved(BoxedHandler),
    /// Looked up in the registry on every dispatch
    Deferred(String),
}

impl Endpoint {
    /// Invoke the handler and normalize its result
    pub(crate) fn call(
        &self,
        registry: &crate::registry::Registry,
        request: &Request,
        params: &Params,
    ) -> Response {
        match self {
            Self::Resolved(handler) => handler(request, params).into_response(),
            Self::Deferred(name) => match registry.handler_by_name(name) {
                Some(handler) => handler(request, params).into_response(),
                None => {
                    warn!(handler = %name, path = %request.path, "Unresolved handler");
                    Response::from_error(&Error::UnresolvedHandler {
                        reference: name.clone(),
                    })
                }
            },
        }
    }
}

/// Conventional resource actions, in `restful` registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// `GET prefix`
    Index,
    /// `POST prefix`
    Store,
    /// `GET prefix/{id}`
    Show,
    /// `PUT|PATCH prefix/{id}`
    Update,
    /// `DELETE prefix/{id}`
    Destroy,
}

impl Action {
    /// Every action once
    pub const ALL: [Self; 5] = [
        Self::Index,
        Self::Store,
        Self::Show,
        Self::Update,
        Self::Destroy,
    ];

    /// The six RESTful routes: method, whether the path carries `{id}`, action
    pub const ROUTES: [(Method, bool, Self); 6] = [
        (Method::Get, false, Self::Index),
        (Method::Post, false, Self::Store),
        (Method::Get, true, Self::Show),
        (Method::Put, true, Self::Update),
        (Method::Patch, true, Self::Update),
        (Method::Delete, true, Self::Destroy),
    ];

    /// Action name used in `Controller@action` references
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Store => "store",
            Self::Show => "show",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }

    /// Call this action on a resource
    pub fn invoke<R: Resource + ?Sized>(
        self,
        resource: &R,
        request: &Request,
        params: &Params,
    ) -> Outcome {
        match self {
            Self::Index => resource.index(request, params),
            Self::Store => resource.store(request, params),
            Self::Show => resource.show(request, params),
            Self::Update => resource.update(request, params),
            Self::Destroy => resource.destroy(request, params),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A controller serving the conventional RESTful actions
///
/// Actions that are not overridden answer with a 500 envelope naming the
/// missing action.
pub trait Resource: Send + Sync + 'static {
    /// List the collection
    fn index(&self, _request: &Request, _params: &Params) -> Outcome {
        missing_action::<Self>(Action::Index)
    }

    /// Create a member
    fn store(&self, _request: &Request, _params: &Params) -> Outcome {
        missing_action::<Self>(Action::Store)
    }

    /// Show one member
    fn show(&self, _request: &Request, _params: &Params) -> Outcome {
        missing_action::<Self>(Action::Show)
    }

    /// Update one member
    fn update(&self, _request: &Request, _params: &Params) -> Outcome {
        missing_action::<Self>(Action::Update)
    }

    /// Delete one member
    fn destroy(&self, _request: &Request, _params: &Params) -> Outcome {
        missing_action::<Self>(Action::Destroy)
    }
}

/// Bind one action of a shared resource as a handler
pub fn resource_action<R: Resource>(resource: &Arc<R>, action: Action) -> BoxedHandler {
    let resource = Arc::clone(resource);
    Arc::new(move |request: &Request, params: &Params| {
        action.invoke(resource.as_ref(), request, params)
    })
}

fn missing_action<R: ?Sized>(action: Action) -> Outcome {
    let type_name = std::any::type_name::<R>();
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    warn!(controller = %short, action = %action, "Action not implemented");
    Outcome::Response(Response::error(500, format!("Action not found: {short}::{action}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct OnlyShow;

    impl Resource for OnlyShow {
        fn show(&self, _request: &Request, params: &Params) -> Outcome {
            json!({"id": params.get("id")}).into()
        }
    }

    #[test]
    fn test_raw_value_is_wrapped() {
        let response = Outcome::from(json!({"pong": true})).into_response();
        assert_eq!(response.code, 0);
        assert_eq!(response.message, "success");
        assert_eq!(response.status, 200);
        assert_eq!(response.data, json!({"pong": true}));
    }

    #[test]
    fn test_response_passes_through() {
        let original = Response::error(401, "Unauthorized");
        let response = Outcome::from(original.clone()).into_response();
        assert_eq!(response, original);
    }

    #[test]
    fn test_unit_is_null_data() {
        let response = Outcome::from(()).into_response();
        assert_eq!(response.data, Value::Null);
        assert!(response.is_success());
    }

    #[test]
    fn test_error_result_maps_to_envelope() {
        let result: Result<Value, Error> = Err(Error::Database {
            message: "gone".to_string(),
        });
        let response = Outcome::from(result).into_response();
        assert_eq!(response.code, 503);
    }

    #[test]
    fn test_boxed_handler_normalizes() {
        let h = boxed(|_req: &Request, params: &Params| json!({"id": params.get("id")}));
        let mut params = Params::new();
        params.insert("id", "7");
        let response = h(&Request::get("/apis/7"), &params).into_response();
        assert_eq!(response.data, json!({"id": "7"}));
    }

    #[test]
    fn test_resource_default_action_is_500() {
        let resource = Arc::new(OnlyShow);
        let store = resource_action(&resource, Action::Store);
        let response = store(&Request::get("/"), &Params::new()).into_response();
        assert_eq!(response.code, 500);
        assert_eq!(response.status, 500);
        assert_eq!(response.message, "Action not found: OnlyShow::store");
    }

    #[test]
    fn test_resource_overridden_action() {
        let resource = Arc::new(OnlyShow);
        let show = resource_action(&resource, Action::Show);
        let params: Params = [("id", "42")].into_iter().collect();
        let response = show(&Request::get("/apis/42"), &params).into_response();
        assert_eq!(response.data, json!({"id": "42"}));
    }

    #[test]
    fn test_restful_table_order() {
        let names: Vec<_> = Action::ROUTES
            .iter()
            .map(|(m, id, a)| format!("{m} {id} {a}"))
            .collect();
        assert_eq!(
            names,
            vec![
                "GET false index",
                "POST false store",
                "GET true show",
                "PUT true update",
                "PATCH true update",
                "DELETE true destroy",
            ]
        );
    }
}
