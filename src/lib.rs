//! Resource SDK: declarative CRUD endpoints over pluggable storage backends.
//!
//! Resources are described once (fields, operations, page sizes), registered with a backend
//! adapter, and served with filtering, sorting, search, offset or cursor pagination and a
//! generated OpenAPI document.

pub mod backend;
pub mod config;
pub mod error;
pub mod field;
pub mod handlers;
pub mod limits;
pub mod openapi;
pub mod query;
pub mod registry;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use backend::{BackendAdapter, Capabilities, DocumentStore, Entity, Page, PageNext, PgBackend, SearchCapability, UpdateMode};
pub use config::{load_resources_from_file, parse_resources, resolve, ApiSettings, Operation, ResourceConfig, ResourceDescriptor};
pub use error::{AppError, ConfigError};
pub use field::{FieldKind, FieldSchema, IdKind};
pub use limits::{MemoryRateLimiter, RateLimiter};
pub use query::{Query, Window};
pub use registry::{Api, ApiBuilder, ResourceHandle};
pub use response::{ApiResponse, ListEnvelope};
pub use routes::{common_routes, resource_routes, router};
pub use service::{ApiRequest, Endpoint, HookContext, HookError, Hooks};
pub use state::AppState;
