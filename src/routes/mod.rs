//! Router assembly.

mod common;
mod resource;

pub use common::common_routes;
pub use resource::resource_routes;

use crate::registry::Api;
use crate::state::AppState;
use axum::Router;
use std::sync::Arc;

/// Full application router: resources, schema document, health and version.
pub fn router(api: Arc<Api>) -> Router {
    let state = AppState::new(api);
    resource_routes(state.clone()).merge(common_routes(state))
}
