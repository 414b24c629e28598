//! Backend adapter contract and its implementations.
//!
//! An adapter translates the abstract [`Query`] into its store's native query and executes it.
//! Every adapter must give the same answers for the same query: filters AND-combined, sort
//! applied in listed order with null before any value, window applied after filtering, and an
//! empty result returned as an empty page rather than an error.

pub mod memory;
pub mod postgres;

use crate::config::ResourceDescriptor;
use crate::error::AppError;
use crate::query::Query;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory::DocumentStore;
pub use postgres::PgBackend;

/// One stored entity: field name to normalized value.
pub type Entity = Map<String, Value>;

/// How a backend matches the `search` term.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchCapability {
    None,
    /// Case-insensitive substring across searchable fields.
    Substring,
    /// Tokenized full-text matching.
    FullText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub search: SearchCapability,
    pub cursor: bool,
}

/// Where the next page starts, if there is one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageNext {
    Offset(u64),
    Cursor(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub items: Vec<Entity>,
    /// Present only when the query asked for a count. Absent is not zero.
    pub total: Option<u64>,
    pub next: Option<PageNext>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    /// PATCH: merge the provided fields.
    Partial,
    /// PUT: replace every writable field; omitted nullable ones become null.
    Full,
}

#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    async fn list(&self, resource: &ResourceDescriptor, query: &Query) -> Result<Page, AppError>;

    async fn get(&self, resource: &ResourceDescriptor, id: &Value) -> Result<Entity, AppError>;

    /// Insert validated fields. Uniqueness or constraint violations yield `IntegrityError`.
    async fn create(&self, resource: &ResourceDescriptor, fields: Entity) -> Result<Entity, AppError>;

    async fn update(
        &self,
        resource: &ResourceDescriptor,
        id: &Value,
        fields: Entity,
        mode: UpdateMode,
    ) -> Result<Entity, AppError>;

    async fn delete(&self, resource: &ResourceDescriptor, id: &Value) -> Result<(), AppError>;

    /// Delete every listed id that exists and return how many were removed. Missing ids are skipped.
    async fn delete_many(&self, resource: &ResourceDescriptor, ids: &[Value]) -> Result<u64, AppError> {
        let mut removed = 0;
        for id in ids {
            match self.delete(resource, id).await {
                Ok(()) => removed += 1,
                Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}

pub(crate) fn not_found(resource: &ResourceDescriptor, id: &Value) -> AppError {
    let id = match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    AppError::NotFound(format!("{} {}", resource.name, id))
}
