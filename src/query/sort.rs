//! Sort pipeline: `sort=name,-age` to an ordered spec with an id tie-break.

use super::{SortKey, SortSpec};
use crate::config::ResourceDescriptor;
use crate::error::AppError;

/// Parse a sort directive into a spec. An absent or blank directive yields the resource default.
/// The id field is appended ascending unless already present so paging is stable.
pub fn compile(raw: Option<&str>, resource: &ResourceDescriptor) -> Result<SortSpec, AppError> {
    let mut keys: Vec<SortKey> = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => resource.default_sort.keys().to_vec(),
        Some(raw) => parse(raw, resource)?,
    };
    let id = &resource.id_field().name;
    if !keys.iter().any(|k| &k.field == id) {
        keys.push(SortKey::asc(id.clone()));
    }
    Ok(SortSpec(keys))
}

/// Parse directives without applying defaults or the tie-break. Used for config default sorts too.
pub fn parse(raw: &str, resource: &ResourceDescriptor) -> Result<Vec<SortKey>, AppError> {
    let mut keys: Vec<SortKey> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, desc) = match part.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (part.strip_prefix('+').unwrap_or(part), false),
        };
        let field = resource
            .field(name)
            .filter(|f| f.sortable || f.is_id())
            .ok_or_else(|| AppError::UnknownSortField(name.to_string()))?;
        if keys.iter().any(|k| k.field == field.name) {
            continue;
        }
        keys.push(if desc {
            SortKey::desc(field.name.clone())
        } else {
            SortKey::asc(field.name.clone())
        });
    }
    Ok(keys)
}
