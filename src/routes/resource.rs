//! Resource routes. Parameterized paths pass the resource name (and id) to the handlers, which
//! look the endpoint up in the registry.

use crate::handlers::{collection, item, openapi_json};
use crate::state::AppState;
use axum::{
    routing::{any, get},
    Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

/// Resource routes under the configured prefix plus `GET /openapi.json`.
pub fn resource_routes(state: AppState) -> Router {
    let settings = state.api.settings();
    let prefix = settings.prefix.trim_end_matches('/').to_string();
    let body_limit = settings.max_body_bytes;

    let resources = Router::new()
        .route("/:resource", any(collection))
        .route("/:resource/", any(collection))
        .route("/:resource/:id", any(item))
        .route("/:resource/:id/", any(item))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(body_limit)))
        .with_state(state.clone());

    let mounted = if prefix.is_empty() {
        Router::new().merge(resources)
    } else {
        Router::new().nest(&prefix, resources)
    };
    mounted.route("/openapi.json", get(openapi_json).with_state(state))
}
