#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::Method;
use resource_sdk::{
    resolve, Api, ApiRequest, ApiResponse, ApiSettings, AppError, BackendAdapter, Capabilities, DocumentStore, Entity,
    Page, Query, ResourceConfig, ResourceDescriptor, SearchCapability, UpdateMode,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `id:int, name:string(filterable, sortable, searchable), age:int(filterable, sortable, nullable)`.
pub fn people_config() -> ResourceConfig {
    serde_json::from_value(json!({
        "name": "people",
        "fields": [
            {"name": "id", "type": "id"},
            {"name": "name", "type": "string", "filterable": true, "sortable": true, "searchable": true},
            {"name": "age", "type": "int", "filterable": true, "sortable": true, "nullable": true}
        ]
    }))
    .unwrap()
}

/// `id:int, name:string(filterable, sortable), age:int(filterable)`; nothing nullable.
pub fn strict_people() -> ResourceDescriptor {
    let config: ResourceConfig = serde_json::from_value(json!({
        "name": "people",
        "fields": [
            {"name": "id", "type": "id"},
            {"name": "name", "type": "string", "filterable": true, "sortable": true},
            {"name": "age", "type": "int", "filterable": true}
        ]
    }))
    .unwrap();
    resolve(&config, &ApiSettings::default()).unwrap()
}

pub fn people() -> ResourceDescriptor {
    resolve(&people_config(), &ApiSettings::default()).unwrap()
}

/// Counts every adapter call while delegating to a document store.
pub struct SpyAdapter {
    inner: DocumentStore,
    calls: AtomicUsize,
    caps: Capabilities,
}

impl SpyAdapter {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities {
            search: SearchCapability::Substring,
            cursor: true,
        })
    }

    pub fn with_capabilities(caps: Capabilities) -> Self {
        SpyAdapter {
            inner: DocumentStore::new(),
            calls: AtomicUsize::new(0),
            caps,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BackendAdapter for SpyAdapter {
    fn name(&self) -> &'static str {
        "spy"
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    async fn list(&self, resource: &ResourceDescriptor, query: &Query) -> Result<Page, AppError> {
        self.hit();
        self.inner.list(resource, query).await
    }

    async fn get(&self, resource: &ResourceDescriptor, id: &Value) -> Result<Entity, AppError> {
        self.hit();
        self.inner.get(resource, id).await
    }

    async fn create(&self, resource: &ResourceDescriptor, fields: Entity) -> Result<Entity, AppError> {
        self.hit();
        self.inner.create(resource, fields).await
    }

    async fn update(
        &self,
        resource: &ResourceDescriptor,
        id: &Value,
        fields: Entity,
        mode: UpdateMode,
    ) -> Result<Entity, AppError> {
        self.hit();
        self.inner.update(resource, id, fields, mode).await
    }

    async fn delete(&self, resource: &ResourceDescriptor, id: &Value) -> Result<(), AppError> {
        self.hit();
        self.inner.delete(resource, id).await
    }
}

/// Registry with a single resource backed by `adapter`.
pub fn api_with(resource: ResourceDescriptor, adapter: Arc<dyn BackendAdapter>) -> Arc<Api> {
    let mut builder = Api::builder(ApiSettings::default());
    builder.register(resource, adapter).unwrap();
    builder.build().unwrap()
}

pub fn get(query: &str) -> ApiRequest {
    ApiRequest::new(Method::GET).query_string(query).unwrap()
}

pub fn post(body: Value) -> ApiRequest {
    ApiRequest::new(Method::POST).body(body)
}

pub async fn create(api: &Api, resource: &str, body: Value) -> Value {
    let res = api.dispatch(resource, post(body)).await.unwrap();
    res.body.unwrap()
}

pub fn items(res: &ApiResponse) -> Vec<Value> {
    res.body.as_ref().unwrap()["items"].as_array().unwrap().clone()
}

pub fn ids(res: &ApiResponse) -> Vec<i64> {
    items(res).iter().map(|i| i["id"].as_i64().unwrap()).collect()
}
