//! Resolve resource configs into descriptors; load configs from JSON files.

use crate::config::resolved::{Operation, ResourceDescriptor, StorageTarget};
use crate::config::types::*;
use crate::config::{validate, ApiSettings};
use crate::error::ConfigError;
use crate::field::{FieldKind, FieldRules, FieldSchema, IdKind};
use crate::query::{sort, SortSpec};
use crate::service::Hooks;
use std::path::Path;

/// Build a descriptor from config (validates first). Page sizes fall back to `settings`.
pub fn resolve(config: &ResourceConfig, settings: &ApiSettings) -> Result<ResourceDescriptor, ConfigError> {
    validate(config, settings)?;

    let fields: Vec<FieldSchema> = config.fields.iter().map(resolve_field).collect::<Result<_, _>>()?;
    let id_index = fields
        .iter()
        .position(FieldSchema::is_id)
        .ok_or_else(|| ConfigError::InvalidResource {
            resource: config.name.clone(),
            message: "missing id field".into(),
        })?;

    let operations = config
        .operations
        .iter()
        .filter_map(|s| Operation::parse(s))
        .collect();

    let mut descriptor = ResourceDescriptor {
        name: config.name.clone(),
        fields,
        id_index,
        operations,
        default_sort: SortSpec::default(),
        default_page_size: config.default_page_size.unwrap_or(settings.default_page_size),
        max_page_size: config.max_page_size.unwrap_or(settings.max_page_size),
        always_count: config.always_count,
        rate_limit: config.rate_limit,
        storage: StorageTarget {
            schema: config.schema.clone(),
            table: config.table.clone().unwrap_or_else(|| config.name.clone()),
        },
        hooks: Hooks::default(),
        description: config.description.clone(),
    };

    let default_sort = sort::parse(&config.default_sort.join(","), &descriptor).map_err(|e| {
        ConfigError::InvalidResource {
            resource: config.name.clone(),
            message: format!("default_sort: {}", e),
        }
    })?;
    descriptor.default_sort = SortSpec(default_sort);
    Ok(descriptor)
}

fn resolve_field(f: &FieldConfig) -> Result<FieldSchema, ConfigError> {
    let kind = match f.type_ {
        FieldTypeConfig::String => FieldKind::String,
        FieldTypeConfig::Int => FieldKind::Int,
        FieldTypeConfig::Float => FieldKind::Float,
        FieldTypeConfig::Bool => FieldKind::Bool,
        FieldTypeConfig::Datetime => FieldKind::Datetime,
        FieldTypeConfig::Enum => FieldKind::Enum(f.values.clone()),
        FieldTypeConfig::Id => FieldKind::Id(match f.id_type {
            IdTypeConfig::Int => IdKind::Int,
            IdTypeConfig::Uuid => IdKind::Uuid,
            IdTypeConfig::Text => IdKind::Text,
        }),
    };
    let is_id = matches!(kind, FieldKind::Id(_));
    let pattern = f
        .validation
        .pattern
        .as_deref()
        .map(regex::Regex::new)
        .transpose()
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    Ok(FieldSchema {
        name: f.name.clone(),
        kind,
        filterable: f.filterable,
        // The id always takes part in ordering as the tie-break.
        sortable: f.sortable || is_id,
        searchable: f.searchable,
        nullable: f.nullable,
        // Ids are generated by the backend and never written by clients.
        read_only: f.read_only || is_id,
        required: f.required && !is_id,
        unique: f.unique || is_id,
        rules: FieldRules {
            min_length: f.validation.min_length,
            max_length: f.validation.max_length,
            pattern,
            format: f.validation.format.clone(),
            minimum: f.validation.minimum,
            maximum: f.validation.maximum,
        },
        description: f.description.clone(),
    })
}

/// Parse a JSON array of resource configs.
pub fn parse_resources(json: &str) -> Result<Vec<ResourceConfig>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Load a JSON array of resource configs from disk.
pub async fn load_resources_from_file(path: impl AsRef<Path>) -> Result<Vec<ResourceConfig>, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading resource config");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_resources(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::people_config;
    use serde_json::json;

    fn settings() -> ApiSettings {
        ApiSettings::default()
    }

    #[test]
    fn resolves_id_as_read_only_and_sortable() {
        let d = resolve(&people_config(), &settings()).unwrap();
        let id = d.id_field();
        assert_eq!(id.name, "id");
        assert!(id.read_only && id.sortable && id.unique);
        assert_eq!(d.default_sort.signature(), "name");
        assert_eq!(d.storage.table, "people");
    }

    #[test]
    fn missing_id_is_rejected() {
        let config: ResourceConfig = serde_json::from_value(json!({
            "name": "things",
            "fields": [{"name": "title", "type": "string"}]
        }))
        .unwrap();
        assert!(matches!(
            resolve(&config, &settings()),
            Err(ConfigError::InvalidResource { .. })
        ));
    }

    #[test]
    fn two_ids_are_rejected() {
        let config: ResourceConfig = serde_json::from_value(json!({
            "name": "things",
            "fields": [{"name": "id", "type": "id"}, {"name": "key", "type": "id"}]
        }))
        .unwrap();
        assert!(resolve(&config, &settings()).is_err());
    }

    #[test]
    fn duplicate_and_reserved_names_are_rejected() {
        let dup: ResourceConfig = serde_json::from_value(json!({
            "name": "things",
            "fields": [{"name": "id", "type": "id"}, {"name": "a", "type": "int"}, {"name": "a", "type": "int"}]
        }))
        .unwrap();
        assert!(matches!(resolve(&dup, &settings()), Err(ConfigError::InvalidField { .. })));

        let reserved: ResourceConfig = serde_json::from_value(json!({
            "name": "things",
            "fields": [{"name": "id", "type": "id"}, {"name": "sort", "type": "int"}]
        }))
        .unwrap();
        assert!(resolve(&reserved, &settings()).is_err());
    }

    #[test]
    fn only_text_fields_are_searchable() {
        let config: ResourceConfig = serde_json::from_value(json!({
            "name": "things",
            "fields": [{"name": "id", "type": "id"}, {"name": "born", "type": "datetime", "searchable": true}]
        }))
        .unwrap();
        assert!(matches!(
            resolve(&config, &settings()),
            Err(ConfigError::InvalidField { ref field, .. }) if field == "born"
        ));
    }

    #[test]
    fn default_sort_must_be_sortable() {
        let mut config = people_config();
        config.default_sort = vec!["bio".into()];
        assert!(resolve(&config, &settings()).is_err());
    }

    #[test]
    fn operations_default_to_all() {
        let config: ResourceConfig = serde_json::from_value(json!({
            "name": "things",
            "fields": [{"name": "id", "type": "id"}]
        }))
        .unwrap();
        let d = resolve(&config, &settings()).unwrap();
        assert!(Operation::ALL.iter().all(|op| d.allows(*op)));
        assert_eq!(d.default_page_size, 20);
        assert_eq!(d.max_page_size, 100);
    }

    #[test]
    fn parses_resource_list() {
        let configs = parse_resources(r#"[{"name": "a", "fields": [{"name": "id", "type": "id", "id_type": "uuid"}]}]"#).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].fields[0].id_type, IdTypeConfig::Uuid);
        assert!(parse_resources("{").is_err());
    }
}
