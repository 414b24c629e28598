//! PostgreSQL adapter: relational rows through the parameterized SQL builder.

use super::{not_found, BackendAdapter, Capabilities, Entity, Page, PageNext, SearchCapability, UpdateMode};
use crate::config::ResourceDescriptor;
use crate::error::AppError;
use crate::field::{format_datetime, FieldKind, FieldSchema, IdKind};
use crate::query::{CursorToken, Query, Window};
use crate::sql::{self, QueryBuf};
use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Row};

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        PgBackend { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the resource's schema and table if missing.
    pub async fn ensure_table(&self, resource: &ResourceDescriptor) -> Result<(), AppError> {
        if let Some(schema) = &resource.storage.schema {
            let ddl = format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", schema.replace('"', "\"\""));
            sqlx::query(&ddl).execute(&self.pool).await.map_err(map_db)?;
        }
        let ddl = sql::create_table(resource);
        tracing::debug!(sql = %ddl, "ensure table");
        sqlx::query(&ddl).execute(&self.pool).await.map_err(map_db)?;
        Ok(())
    }

    async fn fetch_all(&self, resource: &ResourceDescriptor, q: QueryBuf) -> Result<Vec<Entity>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bound(&q).fetch_all(&self.pool).await.map_err(map_db)?;
        rows.iter().map(|r| row_to_entity(resource, r)).collect()
    }

    async fn fetch_optional(&self, resource: &ResourceDescriptor, q: QueryBuf) -> Result<Option<Entity>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bound(&q).fetch_optional(&self.pool).await.map_err(map_db)?;
        row.map(|r| row_to_entity(resource, &r)).transpose()
    }
}

fn bound(q: &QueryBuf) -> sqlx::query::Query<'_, sqlx::Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

/// Constraint violations (SQLSTATE class 23) become integrity errors; the rest stay database errors.
fn map_db(e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error() {
        if db.code().map(|c| c.starts_with("23")).unwrap_or(false) {
            return AppError::IntegrityError(db.message().to_string());
        }
    }
    AppError::Db(e)
}

fn row_to_entity(resource: &ResourceDescriptor, row: &PgRow) -> Result<Entity, AppError> {
    let mut entity = Entity::new();
    for f in &resource.fields {
        entity.insert(f.name.clone(), cell_to_value(row, f)?);
    }
    Ok(entity)
}

fn cell_to_value(row: &PgRow, f: &FieldSchema) -> Result<Value, AppError> {
    let name = f.name.as_str();
    Ok(match &f.kind {
        FieldKind::Int | FieldKind::Id(IdKind::Int) => row
            .try_get::<Option<i64>, _>(name)?
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::Null),
        FieldKind::Float => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldKind::Bool => row
            .try_get::<Option<bool>, _>(name)?
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        FieldKind::Datetime => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(format_datetime(&d)))
            .unwrap_or(Value::Null),
        FieldKind::Id(IdKind::Uuid) => row
            .try_get::<Option<uuid::Uuid>, _>(name)?
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        FieldKind::String | FieldKind::Enum(_) | FieldKind::Id(IdKind::Text) => row
            .try_get::<Option<String>, _>(name)?
            .map(Value::String)
            .unwrap_or(Value::Null),
    })
}

#[async_trait]
impl BackendAdapter for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            search: SearchCapability::Substring,
            cursor: true,
        }
    }

    async fn list(&self, resource: &ResourceDescriptor, query: &Query) -> Result<Page, AppError> {
        let total = if query.count {
            let q = sql::count(resource, query)?;
            tracing::debug!(sql = %q.sql, params = ?q.params, "count");
            let n: i64 = bound(&q).fetch_one(&self.pool).await.map_err(map_db)?.try_get(0)?;
            Some(n.max(0) as u64)
        } else {
            None
        };

        let limit = query.window.limit() as usize;
        let mut items = self.fetch_all(resource, sql::select_list(resource, query)?).await?;
        let has_more = items.len() > limit;
        items.truncate(limit);

        let next = match (&query.window, has_more, items.last()) {
            (Window::Offset { offset, .. }, true, _) => Some(PageNext::Offset(offset + limit as u64)),
            (Window::Cursor { .. }, true, Some(last)) => {
                Some(PageNext::Cursor(CursorToken::for_entity(resource, &query.sort, last)?))
            }
            _ => None,
        };
        Ok(Page { items, total, next })
    }

    async fn get(&self, resource: &ResourceDescriptor, id: &Value) -> Result<Entity, AppError> {
        self.fetch_optional(resource, sql::select_by_id(resource, id)?)
            .await?
            .ok_or_else(|| not_found(resource, id))
    }

    async fn create(&self, resource: &ResourceDescriptor, fields: Entity) -> Result<Entity, AppError> {
        self.fetch_optional(resource, sql::insert(resource, &fields)?)
            .await?
            .ok_or_else(|| AppError::Backend(format!("insert into {} returned no row", resource.name)))
    }

    async fn update(
        &self,
        resource: &ResourceDescriptor,
        id: &Value,
        fields: Entity,
        mode: UpdateMode,
    ) -> Result<Entity, AppError> {
        self.fetch_optional(resource, sql::update(resource, id, &fields, mode)?)
            .await?
            .ok_or_else(|| not_found(resource, id))
    }

    async fn delete(&self, resource: &ResourceDescriptor, id: &Value) -> Result<(), AppError> {
        let q = sql::delete(resource, id)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        match bound(&q).fetch_optional(&self.pool).await.map_err(map_db)? {
            Some(_) => Ok(()),
            None => Err(not_found(resource, id)),
        }
    }

    async fn delete_many(&self, resource: &ResourceDescriptor, ids: &[Value]) -> Result<u64, AppError> {
        let q = sql::delete_many(resource, ids)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bound(&q).execute(&self.pool).await.map_err(map_db)?;
        Ok(done.rows_affected())
    }
}
