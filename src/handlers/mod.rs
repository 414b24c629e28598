//! HTTP handlers for resources and the schema document.

pub mod resource;
pub mod schema;
pub use resource::*;
pub use schema::*;
