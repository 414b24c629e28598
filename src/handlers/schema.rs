//! Serves the OpenAPI document rendered when the registry was built.

use crate::state::AppState;
use axum::{extract::State, http::header, response::IntoResponse};

pub async fn openapi_json(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.api.schema_json().to_string(),
    )
}
