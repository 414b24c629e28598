//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE and DDL from a resource descriptor.

use super::params::{pg_type_name, PgBindValue};
use crate::backend::{Entity, UpdateMode};
use crate::config::ResourceDescriptor;
use crate::error::AppError;
use crate::field::{FieldKind, FieldSchema, IdKind};
use crate::query::{Direction, FilterExpr, FilterValue, Operator, Query, Window};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from descriptors).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(resource: &ResourceDescriptor) -> String {
    match &resource.storage.schema {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(&resource.storage.table)),
        None => quoted(&resource.storage.table),
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> String {
        self.params.push(v);
        format!("${}", self.params.len())
    }

    fn push_typed(&mut self, field: &FieldSchema, v: &Value) -> Result<String, AppError> {
        Ok(self.push_param(PgBindValue::typed(&field.kind, v)?))
    }
}

fn column_list(resource: &ResourceDescriptor) -> String {
    resource
        .fields
        .iter()
        .map(|f| quoted(&f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column as an ordering expression. Text compares by code point, the order the document store uses.
fn ordered(f: &FieldSchema) -> String {
    match f.kind {
        FieldKind::String | FieldKind::Enum(_) | FieldKind::Id(IdKind::Text) => format!("{} COLLATE \"C\"", quoted(&f.name)),
        _ => quoted(&f.name),
    }
}

fn field<'a>(resource: &'a ResourceDescriptor, name: &str) -> Result<&'a FieldSchema, AppError> {
    resource
        .field(name)
        .ok_or_else(|| AppError::Backend(format!("{} has no field {}", resource.name, name)))
}

fn filter_clause(q: &mut QueryBuf, resource: &ResourceDescriptor, filter: &FilterExpr) -> Result<String, AppError> {
    let f = field(resource, &filter.field)?;
    let col = quoted(&f.name);
    Ok(match (&filter.op, &filter.value) {
        (Operator::In, FilterValue::List(values)) => {
            if values.is_empty() {
                return Ok("FALSE".into());
            }
            let phs = values
                .iter()
                .map(|v| q.push_typed(f, v))
                .collect::<Result<Vec<_>, _>>()?;
            format!("{} IN ({})", col, phs.join(", "))
        }
        (Operator::Contains, FilterValue::List(terms)) => {
            if terms.is_empty() {
                return Ok("FALSE".into());
            }
            let parts = terms
                .iter()
                .map(|t| Ok(format!("strpos({}, {}) > 0", col, q.push_typed(f, t)?)))
                .collect::<Result<Vec<_>, AppError>>()?;
            format!("({})", parts.join(" OR "))
        }
        (op, FilterValue::Scalar(v)) => {
            let ph = q.push_typed(f, v)?;
            let sql_op = match op {
                Operator::Eq => "=",
                Operator::Ne => "IS DISTINCT FROM",
                Operator::Lt => "<",
                Operator::Lte => "<=",
                Operator::Gt => ">",
                Operator::Gte => ">=",
                Operator::In | Operator::Contains => {
                    return Err(AppError::Backend(format!("operator {} needs a list", op.as_str())));
                }
            };
            format!("{} {} {}", col, sql_op, ph)
        }
        (op, FilterValue::List(_)) => {
            return Err(AppError::Backend(format!("operator {} takes a single value", op.as_str())));
        }
    })
}

fn search_clause(q: &mut QueryBuf, resource: &ResourceDescriptor, term: &str) -> String {
    let cols: Vec<String> = resource.searchable_fields().map(|f| quoted(&f.name)).collect();
    if cols.is_empty() {
        return "FALSE".into();
    }
    let ph = q.push_param(PgBindValue::Text(term.to_string()));
    let parts: Vec<String> = cols
        .iter()
        .map(|c| format!("strpos(lower({}), lower({})) > 0", c, ph))
        .collect();
    format!("({})", parts.join(" OR "))
}

/// Keyset predicate: rows strictly after `after` under the query's sort. Null sorts first.
fn keyset_clause(q: &mut QueryBuf, resource: &ResourceDescriptor, query: &Query, after: &[Value]) -> Result<String, AppError> {
    let mut alternatives = Vec::new();
    let mut equal_prefix: Vec<String> = Vec::new();
    for (key, value) in query.sort.keys().iter().zip(after) {
        let f = field(resource, &key.field)?;
        let col = quoted(&f.name);
        let strictly_after = match (key.direction, value.is_null()) {
            (Direction::Asc, true) => Some(format!("{} IS NOT NULL", col)),
            (Direction::Asc, false) => Some(format!("{} > {}", ordered(f), q.push_typed(f, value)?)),
            (Direction::Desc, true) => None,
            (Direction::Desc, false) => {
                let ph = q.push_typed(f, value)?;
                Some(format!("({} < {} OR {} IS NULL)", ordered(f), ph, col))
            }
        };
        if let Some(cond) = strictly_after {
            let mut parts = equal_prefix.clone();
            parts.push(cond);
            alternatives.push(format!("({})", parts.join(" AND ")));
        }
        equal_prefix.push(if value.is_null() {
            format!("{} IS NULL", col)
        } else {
            format!("{} = {}", col, q.push_typed(f, value)?)
        });
    }
    if alternatives.is_empty() {
        return Ok("FALSE".into());
    }
    Ok(format!("({})", alternatives.join(" OR ")))
}

fn where_parts(q: &mut QueryBuf, resource: &ResourceDescriptor, query: &Query) -> Result<Vec<String>, AppError> {
    let mut parts = Vec::new();
    for filter in &query.filters {
        parts.push(filter_clause(q, resource, filter)?);
    }
    if let Some(term) = &query.search {
        parts.push(search_clause(q, resource, term));
    }
    Ok(parts)
}

fn where_sql(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// SELECT page: filters, search, keyset, ORDER BY sort spec, LIMIT limit+1 to detect a next page.
pub fn select_list(resource: &ResourceDescriptor, query: &Query) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut parts = where_parts(&mut q, resource, query)?;
    if let Window::Cursor { after: Some(after), .. } = &query.window {
        parts.push(keyset_clause(&mut q, resource, query, after)?);
    }
    let order = query
        .sort
        .keys()
        .iter()
        .map(|k| {
            let col = ordered(field(resource, &k.field)?);
            Ok(match k.direction {
                Direction::Asc => format!("{} ASC NULLS FIRST", col),
                Direction::Desc => format!("{} DESC NULLS LAST", col),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?
        .join(", ");
    let order_clause = if order.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order)
    };
    let fetch = u64::from(query.window.limit()) + 1;
    let window_clause = match &query.window {
        Window::Offset { offset, .. } => format!(" LIMIT {} OFFSET {}", fetch, offset),
        Window::Cursor { .. } => format!(" LIMIT {}", fetch),
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        column_list(resource),
        qualified_table(resource),
        where_sql(&parts),
        order_clause,
        window_clause
    );
    Ok(q)
}

/// SELECT COUNT(*) over filters and search only.
pub fn count(resource: &ResourceDescriptor, query: &Query) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let parts = where_parts(&mut q, resource, query)?;
    q.sql = format!("SELECT COUNT(*) FROM {}{}", qualified_table(resource), where_sql(&parts));
    Ok(q)
}

/// SELECT by primary key.
pub fn select_by_id(resource: &ResourceDescriptor, id: &Value) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let pk = resource.id_field();
    let ph = q.push_typed(pk, id)?;
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        column_list(resource),
        qualified_table(resource),
        quoted(&pk.name),
        ph
    );
    Ok(q)
}

/// INSERT every non-id field (absent ones as NULL); the id comes from the column default.
pub fn insert(resource: &ResourceDescriptor, fields: &Entity) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in resource.fields.iter().filter(|f| !f.is_id()) {
        let v = fields.get(&f.name).unwrap_or(&Value::Null);
        cols.push(quoted(&f.name));
        placeholders.push(q.push_typed(f, v)?);
    }
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            qualified_table(resource),
            column_list(resource)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(resource),
            cols.join(", "),
            placeholders.join(", "),
            column_list(resource)
        )
    };
    Ok(q)
}

/// UPDATE by id. Partial sets only provided fields; full sets every writable field.
/// With nothing to set this degrades to a SELECT by id.
pub fn update(resource: &ResourceDescriptor, id: &Value, fields: &Entity, mode: UpdateMode) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    match mode {
        UpdateMode::Partial => {
            for f in resource.fields.iter().filter(|f| !f.is_id()) {
                if let Some(v) = fields.get(&f.name) {
                    sets.push(format!("{} = {}", quoted(&f.name), q.push_typed(f, v)?));
                }
            }
        }
        UpdateMode::Full => {
            for f in resource.writable_fields() {
                let v = fields.get(&f.name).unwrap_or(&Value::Null);
                sets.push(format!("{} = {}", quoted(&f.name), q.push_typed(f, v)?));
            }
        }
    }
    if sets.is_empty() {
        return select_by_id(resource, id);
    }
    let pk = resource.id_field();
    let id_ph = q.push_typed(pk, id)?;
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(resource),
        sets.join(", "),
        quoted(&pk.name),
        id_ph,
        column_list(resource)
    );
    Ok(q)
}

/// DELETE by id, returning the id so a miss is detectable.
pub fn delete(resource: &ResourceDescriptor, id: &Value) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let pk = resource.id_field();
    let ph = q.push_typed(pk, id)?;
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(resource),
        quoted(&pk.name),
        ph,
        quoted(&pk.name)
    );
    Ok(q)
}

/// DELETE every listed id in one statement; the caller reads the affected row count.
pub fn delete_many(resource: &ResourceDescriptor, ids: &[Value]) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let pk = resource.id_field();
    let phs = ids
        .iter()
        .map(|id| q.push_typed(pk, id))
        .collect::<Result<Vec<_>, _>>()?;
    let cond = if phs.is_empty() {
        "FALSE".to_string()
    } else {
        format!("{} IN ({})", quoted(&pk.name), phs.join(", "))
    };
    q.sql = format!("DELETE FROM {} WHERE {}", qualified_table(resource), cond);
    Ok(q)
}

fn column_ddl(f: &FieldSchema) -> String {
    let mut def = format!("{} ", quoted(&f.name));
    match &f.kind {
        FieldKind::Id(IdKind::Int) => def.push_str("BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY"),
        FieldKind::Id(IdKind::Uuid) => def.push_str("UUID PRIMARY KEY DEFAULT gen_random_uuid()"),
        FieldKind::Id(IdKind::Text) => def.push_str("TEXT PRIMARY KEY DEFAULT gen_random_uuid()::text"),
        kind => {
            def.push_str(match pg_type_name(kind) {
                "INT8" => "BIGINT",
                "FLOAT8" => "DOUBLE PRECISION",
                "BOOL" => "BOOLEAN",
                other => other,
            });
            if !f.nullable {
                def.push_str(" NOT NULL");
            }
            if f.unique {
                def.push_str(" UNIQUE");
            }
            if let FieldKind::Enum(values) = kind {
                let allowed: Vec<String> = values.iter().map(|v| format!("'{}'", v.replace('\'', "''"))).collect();
                def.push_str(&format!(" CHECK ({} IN ({}))", quoted(&f.name), allowed.join(", ")));
            }
        }
    }
    def
}

/// CREATE TABLE IF NOT EXISTS for the resource's backing table.
pub fn create_table(resource: &ResourceDescriptor) -> String {
    let cols: Vec<String> = resource.fields.iter().map(column_ddl).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified_table(resource),
        cols.join(", ")
    )
}
