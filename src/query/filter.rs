//! Filter pipeline: `<field>=<v>` and `<field>__<op>=<v>` pairs to typed predicates.

use super::{FilterExpr, FilterValue, Operator, OPERATOR_SEPARATOR, RESERVED_PARAMS};
use crate::config::ResourceDescriptor;
use crate::error::AppError;
use crate::field::FieldSchema;

/// Compile every non-reserved query pair into a filter. Pure; fails on the first bad pair.
pub fn compile(params: &[(String, String)], resource: &ResourceDescriptor) -> Result<Vec<FilterExpr>, AppError> {
    let mut out: Vec<FilterExpr> = Vec::new();
    for (key, raw) in params {
        if RESERVED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        let (field, op) = split_key(key, resource)?;
        if !op.valid_for(&field.kind) {
            return Err(AppError::field(
                &field.name,
                format!("operator '{}' is not supported for {} fields", op.as_str(), field.kind.name()),
            ));
        }
        if op.takes_list() {
            let values = raw
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| coerce(field, s))
                .collect::<Result<Vec<_>, _>>()?;
            let existing = out
                .iter_mut()
                .find(|e| e.field == field.name && e.op == op);
            match existing {
                Some(FilterExpr {
                    value: FilterValue::List(list),
                    ..
                }) => list.extend(values),
                _ => out.push(FilterExpr {
                    field: field.name.clone(),
                    op,
                    value: FilterValue::List(values),
                }),
            }
        } else {
            out.push(FilterExpr {
                field: field.name.clone(),
                op,
                value: FilterValue::Scalar(coerce(field, raw)?),
            });
        }
    }
    Ok(out)
}

fn split_key<'a>(key: &str, resource: &'a ResourceDescriptor) -> Result<(&'a FieldSchema, Operator), AppError> {
    let (name, op) = match key.rsplit_once(OPERATOR_SEPARATOR) {
        Some((name, suffix)) => match Operator::parse(suffix) {
            Some(op) => (name, op),
            None if resource.field(key).is_some() => (key, Operator::Eq),
            None if resource.field(name).is_some() => {
                return Err(AppError::field(name, format!("unknown filter operator '{}'", suffix)));
            }
            None => (key, Operator::Eq),
        },
        None => (key, Operator::Eq),
    };
    let field = resource
        .field(name)
        .filter(|f| f.filterable)
        .ok_or_else(|| AppError::UnknownFilterField(name.to_string()))?;
    Ok((field, op))
}

fn coerce(field: &FieldSchema, raw: &str) -> Result<serde_json::Value, AppError> {
    field.parse_query(raw).map_err(|message| AppError::FilterTypeError {
        field: field.name.clone(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::people;
    use serde_json::json;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn plain_key_is_equality() {
        let filters = compile(&pairs(&[("name", "x")]), &people()).unwrap();
        assert_eq!(
            filters,
            vec![FilterExpr {
                field: "name".into(),
                op: Operator::Eq,
                value: FilterValue::Scalar(json!("x")),
            }]
        );
    }

    #[test]
    fn reserved_keys_are_skipped() {
        let params = pairs(&[("sort", "-name"), ("limit", "5"), ("search", "x"), ("count", "true")]);
        assert!(compile(&params, &people()).unwrap().is_empty());
    }

    #[test]
    fn range_on_one_field_keeps_both_bounds() {
        let filters = compile(&pairs(&[("age__gte", "5"), ("age__lte", "9")]), &people()).unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].op, Operator::Gte);
        assert_eq!(filters[1].op, Operator::Lte);
        assert_eq!(filters[1].value, FilterValue::Scalar(json!(9)));
    }

    #[test]
    fn in_collapses_repeats_and_commas() {
        let filters = compile(&pairs(&[("age__in", "1,2"), ("age__in", "3")]), &people()).unwrap();
        assert_eq!(
            filters,
            vec![FilterExpr {
                field: "age".into(),
                op: Operator::In,
                value: FilterValue::List(vec![json!(1), json!(2), json!(3)]),
            }]
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = compile(&pairs(&[("nope", "1")]), &people()).unwrap_err();
        assert!(matches!(err, AppError::UnknownFilterField(f) if f == "nope"));
    }

    #[test]
    fn non_filterable_field_is_rejected() {
        let err = compile(&pairs(&[("bio__contains", "x")]), &people()).unwrap_err();
        assert!(matches!(err, AppError::UnknownFilterField(f) if f == "bio"));
    }

    #[test]
    fn bad_value_names_the_field() {
        let err = compile(&pairs(&[("age__gt", "old")]), &people()).unwrap_err();
        assert!(matches!(err, AppError::FilterTypeError { field, .. } if field == "age"));
    }

    #[test]
    fn unknown_operator_on_known_field() {
        let err = compile(&pairs(&[("age__like", "1")]), &people()).unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(f), .. } if f == "age"));
    }

    #[test]
    fn contains_requires_text_field() {
        let err = compile(&pairs(&[("age__contains", "1")]), &people()).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(compile(&pairs(&[("name__contains", "a")]), &people()).is_ok());
    }
}
