//! Health and version routes.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    resources: usize,
}

#[derive(Serialize)]
struct VersionBody {
    name: String,
    version: String,
    sdk: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        resources: state.api.endpoints().count(),
    })
}

/// API title and version from settings, plus the library version serving them.
async fn version(State(state): State<AppState>) -> Json<VersionBody> {
    let settings = state.api.settings();
    Json(VersionBody {
        name: settings.title.clone(),
        version: settings.version.clone(),
        sdk: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health, GET /version.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .with_state(state)
}
