mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use resource_sdk::{router, DocumentStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    router(api_with(people(), Arc::new(DocumentStore::new())))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(b) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&b).unwrap())
        }
        None => Body::empty(),
    };
    let res = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, json)
}

#[tokio::test]
async fn crud_over_http() {
    let app = app();

    let (status, _, created) = send(&app, "POST", "/api/people/", Some(json!({"name": "x", "age": 5}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created, json!({"id": 1, "name": "x", "age": 5}));

    let (status, headers, page) = send(&app, "GET", "/api/people?age__gte=5&sort=-name", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page, json!({"items": [created]}));
    assert_eq!(headers.get("x-limit").unwrap(), "20");
    assert_eq!(headers.get("x-offset").unwrap(), "0");
    assert!(headers.get("x-total").is_none());

    let (status, _, one) = send(&app, "GET", "/api/people/1/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["name"], json!("x"));

    let (status, _, patched) = send(&app, "PATCH", "/api/people/1", Some(json!({"age": 6}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched, json!({"id": 1, "name": "x", "age": 6}));

    let (status, _, body) = send(&app, "DELETE", "/api/people/1/", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _, err) = send(&app, "GET", "/api/people/1/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], json!("NotFound"));
}

#[tokio::test]
async fn errors_use_the_envelope() {
    let app = app();

    let (status, _, err) = send(&app, "GET", "/api/people?nope=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err, json!({"error": "UnknownFilterField", "message": "unknown filter field: nope", "field": "nope"}));

    let (status, _, err) = send(&app, "POST", "/api/people/", Some(json!({"name": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], json!("ValidationError"));
    assert_eq!(err["field"], json!("name"));

    let (status, _, _) = send(&app, "PUT", "/api/people/", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _, _) = send(&app, "GET", "/api/ghosts/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_delete_over_http() {
    let app = app();
    for name in ["a", "b"] {
        send(&app, "POST", "/api/people/", Some(json!({"name": name}))).await;
    }

    let (status, _, _) = send(&app, "DELETE", "/api/people/", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, err) = send(&app, "DELETE", "/api/people", Some(json!([1]))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], json!("NotFound"));
}

#[tokio::test]
async fn repeated_in_keys_merge() {
    let app = app();
    for (name, age) in [("a", 1), ("b", 2), ("c", 3)] {
        send(&app, "POST", "/api/people/", Some(json!({"name": name, "age": age}))).await;
    }
    let (_, _, page) = send(&app, "GET", "/api/people?age__in=1&age__in=3&sort=name&count=true", None).await;
    let names: Vec<&str> = page["items"].as_array().unwrap().iter().map(|i| i["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["a", "c"]);
    assert_eq!(page["total"], json!(2));
}

#[tokio::test]
async fn schema_and_common_routes() {
    let app = app();

    let (status, _, doc) = send(&app, "GET", "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"].get("/api/people/").is_some());
    assert!(doc["paths"].get("/api/people/{id}/").is_some());
    assert_eq!(doc["components"]["schemas"]["People"]["properties"].as_object().unwrap().len(), 3);

    let (status, _, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health, json!({"status": "ok", "resources": 1}));

    let (status, _, version) = send(&app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version["name"], json!("Resource API"));
    assert_eq!(version["version"], json!("1.0.0"));
}
