//! Request body validation against the resource's field schemas.

use crate::backend::Entity;
use crate::config::ResourceDescriptor;
use crate::error::AppError;
use serde_json::Value;

/// Which write the body is for; decides how missing required fields are treated. A field counts
/// as required when declared so or when it is not nullable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    /// PUT: every required field must be present.
    Replace,
    /// PATCH: only provided fields are checked.
    Merge,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate one JSON object body. Unknown fields are rejected; read-only fields are dropped.
    /// Returns the normalized writable fields.
    pub fn validate(resource: &ResourceDescriptor, body: &Value, kind: WriteKind) -> Result<Entity, AppError> {
        let obj = match body {
            Value::Object(m) => m,
            _ => return Err(AppError::validation("request body must be a JSON object")),
        };
        let mut out = Entity::new();
        for (key, raw) in obj {
            let field = resource
                .field(key)
                .ok_or_else(|| AppError::field(key.as_str(), format!("unknown field: {}", key)))?;
            if field.read_only || field.is_id() {
                continue;
            }
            let value = field
                .validate(raw)
                .map_err(|msg| AppError::field(key.as_str(), format!("{} {}", key, msg)))?;
            out.insert(key.clone(), value);
        }
        if kind != WriteKind::Merge {
            for field in resource.fields.iter().filter(|f| f.required_on_write()) {
                let missing = out.get(&field.name).map(Value::is_null).unwrap_or(true);
                if missing {
                    return Err(AppError::field(
                        field.name.as_str(),
                        format!("{} is required", field.name),
                    ));
                }
            }
        }
        Ok(out)
    }

    /// Validate a create body: one object, or an array of objects for bulk create.
    /// Every item is checked before any is returned.
    pub fn validate_create(resource: &ResourceDescriptor, body: &Value) -> Result<(Vec<Entity>, bool), AppError> {
        match body {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(AppError::validation("bulk create needs at least one item"));
                }
                let entities = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        Self::validate(resource, item, WriteKind::Create).map_err(|e| match e {
                            AppError::Validation { message, field } => AppError::Validation {
                                message: format!("item {}: {}", i, message),
                                field,
                            },
                            other => other,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((entities, true))
            }
            other => Ok((vec![Self::validate(resource, other, WriteKind::Create)?], false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::people;
    use serde_json::json;

    #[test]
    fn drops_read_only_and_normalizes() {
        let fields = RequestValidator::validate(&people(), &json!({"id": 99, "name": "ann", "age": 3.0}), WriteKind::Create)
            .unwrap();
        assert!(!fields.contains_key("id"));
        assert_eq!(fields.get("age"), Some(&json!(3)));
    }

    #[test]
    fn rejects_unknown_field() {
        let err = RequestValidator::validate(&people(), &json!({"name": "ann", "nick": "a"}), WriteKind::Create)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "nick"));
    }

    #[test]
    fn required_depends_on_write_kind() {
        let body = json!({"age": 4});
        assert!(RequestValidator::validate(&people(), &body, WriteKind::Create).is_err());
        assert!(RequestValidator::validate(&people(), &body, WriteKind::Replace).is_err());
        assert!(RequestValidator::validate(&people(), &body, WriteKind::Merge).is_ok());
    }

    #[test]
    fn omitted_non_nullable_field_is_required() {
        for kind in [WriteKind::Create, WriteKind::Replace] {
            let err = RequestValidator::validate(&people(), &json!({"name": "ann"}), kind).unwrap_err();
            assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "age"));
        }
        let fields = RequestValidator::validate(&people(), &json!({"name": "ann", "age": 1}), WriteKind::Create).unwrap();
        assert!(!fields.contains_key("bio"));
        assert!(RequestValidator::validate(&people(), &json!({"name": "ann"}), WriteKind::Merge).is_ok());
    }

    #[test]
    fn rejects_wrong_type_and_non_object() {
        assert!(RequestValidator::validate(&people(), &json!({"age": "old"}), WriteKind::Merge).is_err());
        assert!(RequestValidator::validate(&people(), &json!([1]), WriteKind::Merge).is_err());
    }

    #[test]
    fn bulk_checks_every_item_first() {
        let body = json!([{"name": "a", "age": 1}, {"age": 1}]);
        let err = RequestValidator::validate_create(&people(), &body).unwrap_err();
        assert!(err.to_string().starts_with("item 1:"));
        let (items, bulk) = RequestValidator::validate_create(&people(), &json!({"name": "a", "age": 1})).unwrap();
        assert!(!bulk);
        assert_eq!(items.len(), 1);
    }
}
