//! Raw config types matching the JSON resource description.

use serde::{Deserialize, Serialize};

/// Field type as written in config: "string", "int", "float", "bool", "datetime", "enum", "id".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldTypeConfig {
    String,
    Int,
    Float,
    Bool,
    Datetime,
    Enum,
    Id,
}

/// Representation of the id value: "int" (generated sequence), "uuid" (generated v4), "text".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdTypeConfig {
    #[default]
    Int,
    Uuid,
    Text,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldTypeConfig,
    /// Allowed values for enum fields.
    #[serde(default)]
    pub values: Vec<String>,
    /// Only meaningful for the id field.
    #[serde(default)]
    pub id_type: IdTypeConfig,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub read_only: bool,
    /// Must be supplied on create and on full update.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub validation: ValidationRule,
    #[serde(default)]
    pub description: Option<String>,
}

fn all_operations() -> Vec<String> {
    ["list", "create", "retrieve", "update", "delete"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Path segment and schema name of the resource.
    pub name: String,
    pub fields: Vec<FieldConfig>,
    #[serde(default = "all_operations")]
    pub operations: Vec<String>,
    /// Sort directives in query-string form, e.g. ["-created", "name"].
    #[serde(default)]
    pub default_sort: Vec<String>,
    #[serde(default)]
    pub default_page_size: Option<u32>,
    #[serde(default)]
    pub max_page_size: Option<u32>,
    /// Count matching rows on every list, not only when `count=true` is passed.
    #[serde(default)]
    pub always_count: bool,
    /// Requests per rate-limit period for this resource; overrides the API default.
    #[serde(default)]
    pub rate_limit: Option<u32>,
    /// Backing table for SQL adapters; defaults to the resource name.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
