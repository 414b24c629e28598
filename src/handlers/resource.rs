//! Resource handlers: turn the axum request into an `ApiRequest` and hand it to the registry.

use crate::error::AppError;
use crate::response::ApiResponse;
use crate::service::ApiRequest;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method},
};
use serde_json::Value;

/// Header carrying the client address when running behind a proxy.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

fn client_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_body(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::validation(format!("invalid JSON body: {}", e)))
}

fn build_request(
    method: Method,
    id: Option<String>,
    headers: &HeaderMap,
    query: Option<String>,
    body: &Bytes,
) -> Result<ApiRequest, AppError> {
    Ok(ApiRequest {
        method,
        id,
        query: crate::query::parse_query_string(query.as_deref())?,
        body: parse_body(body)?,
        client: client_key(headers),
    })
}

/// `/:resource` and `/:resource/`: list, create and bulk delete.
pub async fn collection(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let req = build_request(method, None, &headers, query, &body)?;
    state.api.dispatch(&resource, req).await
}

/// `/:resource/:id` and `/:resource/:id/`: retrieve, update, delete.
pub async fn item(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let req = build_request(method, Some(id), &headers, query, &body)?;
    state.api.dispatch(&resource, req).await
}
