//! Response projection: `schema_only=a,b` keeps only the listed fields, `schema_exclude=c` drops them.

use super::{SCHEMA_EXCLUDE_PARAM, SCHEMA_ONLY_PARAM};
use crate::config::ResourceDescriptor;
use crate::error::AppError;

/// Fields kept in serialized entities. The default keeps every field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Projection {
    only: Option<Vec<String>>,
    exclude: Vec<String>,
}

impl Projection {
    /// Repeated keys and comma-separated values merge. Unknown field names are rejected.
    pub fn compile(params: &[(String, String)], resource: &ResourceDescriptor) -> Result<Projection, AppError> {
        let only = names(params, SCHEMA_ONLY_PARAM, resource)?;
        let exclude = names(params, SCHEMA_EXCLUDE_PARAM, resource)?;
        Ok(Projection {
            only: if only.is_empty() { None } else { Some(only) },
            exclude,
        })
    }

    pub fn includes(&self, field: &str) -> bool {
        let listed = self.only.as_ref().map_or(true, |only| only.iter().any(|f| f == field));
        listed && !self.exclude.iter().any(|f| f == field)
    }
}

fn names(params: &[(String, String)], key: &str, resource: &ResourceDescriptor) -> Result<Vec<String>, AppError> {
    let mut out: Vec<String> = Vec::new();
    for (_, raw) in params.iter().filter(|(k, _)| k == key) {
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if resource.field(name).is_none() {
                return Err(AppError::field(key, format!("{}: unknown field {}", key, name)));
            }
            if !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
    }
    Ok(out)
}
