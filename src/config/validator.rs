//! Config validation: field uniqueness, id invariants and option consistency.

use crate::config::{ApiSettings, FieldTypeConfig, Operation, ResourceConfig};
use crate::error::ConfigError;
use crate::query::{OPERATOR_SEPARATOR, RESERVED_PARAMS};
use std::collections::HashSet;

fn invalid(config: &ResourceConfig, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidResource {
        resource: config.name.clone(),
        message: message.into(),
    }
}

fn invalid_field(config: &ResourceConfig, field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        resource: config.name.clone(),
        field: field.to_string(),
        message: message.into(),
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn validate(config: &ResourceConfig, settings: &ApiSettings) -> Result<(), ConfigError> {
    if !is_identifier(&config.name) {
        return Err(invalid(config, "name must be non-empty and use only [A-Za-z0-9_-]"));
    }
    if config.fields.is_empty() {
        return Err(invalid(config, "at least one field required"));
    }

    let mut names = HashSet::new();
    let mut id_count = 0;
    for f in &config.fields {
        if !is_identifier(&f.name) || f.name.contains(OPERATOR_SEPARATOR) {
            return Err(invalid_field(config, &f.name, "field names use [A-Za-z0-9_-] without '__'"));
        }
        if RESERVED_PARAMS.contains(&f.name.as_str()) {
            return Err(invalid_field(config, &f.name, "name is reserved for query parameters"));
        }
        if !names.insert(f.name.as_str()) {
            return Err(invalid_field(config, &f.name, "duplicate field"));
        }
        match f.type_ {
            FieldTypeConfig::Id => {
                id_count += 1;
                if f.nullable {
                    return Err(invalid_field(config, &f.name, "id may not be nullable"));
                }
            }
            FieldTypeConfig::Enum if f.values.is_empty() => {
                return Err(invalid_field(config, &f.name, "enum fields need at least one value"));
            }
            _ => {}
        }
        if f.searchable && !matches!(f.type_, FieldTypeConfig::String | FieldTypeConfig::Enum) {
            return Err(invalid_field(config, &f.name, "only string and enum fields are searchable"));
        }
        if let Some(pattern) = &f.validation.pattern {
            regex::Regex::new(pattern).map_err(|e| invalid_field(config, &f.name, format!("invalid pattern: {}", e)))?;
        }
        if let (Some(min), Some(max)) = (f.validation.min_length, f.validation.max_length) {
            if min > max {
                return Err(invalid_field(config, &f.name, "min_length exceeds max_length"));
            }
        }
    }
    if id_count != 1 {
        return Err(invalid(config, format!("exactly one id field required, found {}", id_count)));
    }

    for op in &config.operations {
        if Operation::parse(op).is_none() {
            return Err(invalid(config, format!("unknown operation '{}'", op)));
        }
    }

    let default_size = config.default_page_size.unwrap_or(settings.default_page_size);
    let max_size = config.max_page_size.unwrap_or(settings.max_page_size);
    if default_size == 0 || max_size == 0 {
        return Err(invalid(config, "page sizes must be at least 1"));
    }
    if default_size > max_size {
        return Err(invalid(config, "default_page_size exceeds max_page_size"));
    }

    Ok(())
}
