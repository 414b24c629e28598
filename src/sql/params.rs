//! Typed bind values: normalized JSON field values converted by field kind.

use crate::error::AppError;
use crate::field::{parse_datetime, FieldKind, IdKind};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value bound to a PostgreSQL query, carrying its own parameter type.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    /// Typed NULL; holds the PostgreSQL type name.
    Null(&'static str),
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Uuid(uuid::Uuid),
}

/// PostgreSQL type used to store a field kind.
pub fn pg_type_name(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Int | FieldKind::Id(IdKind::Int) => "INT8",
        FieldKind::Float => "FLOAT8",
        FieldKind::Bool => "BOOL",
        FieldKind::Datetime => "TIMESTAMPTZ",
        FieldKind::Id(IdKind::Uuid) => "UUID",
        FieldKind::String | FieldKind::Enum(_) | FieldKind::Id(IdKind::Text) => "TEXT",
    }
}

impl PgBindValue {
    /// Convert a value already normalized by the field's validate step.
    pub fn typed(kind: &FieldKind, v: &Value) -> Result<Self, AppError> {
        if v.is_null() {
            return Ok(PgBindValue::Null(pg_type_name(kind)));
        }
        let mismatch = || AppError::Backend(format!("cannot bind {} as {}", v, kind.name()));
        Ok(match kind {
            FieldKind::Int | FieldKind::Id(IdKind::Int) => PgBindValue::I64(v.as_i64().ok_or_else(mismatch)?),
            FieldKind::Float => PgBindValue::F64(v.as_f64().ok_or_else(mismatch)?),
            FieldKind::Bool => PgBindValue::Bool(v.as_bool().ok_or_else(mismatch)?),
            FieldKind::Datetime => PgBindValue::Timestamp(v.as_str().and_then(parse_datetime).ok_or_else(mismatch)?),
            FieldKind::Id(IdKind::Uuid) => PgBindValue::Uuid(
                v.as_str()
                    .and_then(|s| uuid::Uuid::parse_str(s).ok())
                    .ok_or_else(mismatch)?,
            ),
            FieldKind::String | FieldKind::Enum(_) | FieldKind::Id(IdKind::Text) => {
                PgBindValue::Text(v.as_str().ok_or_else(mismatch)?.to_string())
            }
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PgBindValue::Null(t) => t,
            PgBindValue::Bool(_) => "BOOL",
            PgBindValue::I64(_) => "INT8",
            PgBindValue::F64(_) => "FLOAT8",
            PgBindValue::Text(_) => "TEXT",
            PgBindValue::Timestamp(_) => "TIMESTAMPTZ",
            PgBindValue::Uuid(_) => "UUID",
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null(_) => Ok(IsNull::Yes),
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf),
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::Text(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf),
            PgBindValue::Timestamp(d) => <DateTime<Utc> as Encode<Postgres>>::encode_by_ref(d, buf),
            PgBindValue::Uuid(u) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(u, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(PgTypeInfo::with_name(self.type_name()))
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}
