//! Per-field metadata plus the validate / serialize capability used by every pipeline.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Primary key representation, used for parsing path ids and generating new ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdKind {
    Int,
    Uuid,
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    Float,
    Bool,
    Datetime,
    Enum(Vec<String>),
    Id(IdKind),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Int => "integer",
            FieldKind::Float => "number",
            FieldKind::Bool => "boolean",
            FieldKind::Datetime => "datetime",
            FieldKind::Enum(_) => "enum",
            FieldKind::Id(IdKind::Int) => "integer id",
            FieldKind::Id(IdKind::Uuid) => "uuid",
            FieldKind::Id(IdKind::Text) => "string id",
        }
    }

    /// Kinds with a meaningful total order for lt/lte/gt/gte.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, FieldKind::Bool | FieldKind::Enum(_))
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, FieldKind::String | FieldKind::Id(IdKind::Text))
    }

    /// Order two normalized values of this kind. Null sorts before every other value.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        match self {
            FieldKind::Int | FieldKind::Id(IdKind::Int) => a.as_i64().cmp(&b.as_i64()),
            FieldKind::Float => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
            FieldKind::Bool => a.as_bool().cmp(&b.as_bool()),
            FieldKind::Datetime => parse_datetime(a.as_str().unwrap_or_default())
                .cmp(&parse_datetime(b.as_str().unwrap_or_default())),
            FieldKind::String | FieldKind::Enum(_) | FieldKind::Id(_) => a.as_str().cmp(&b.as_str()),
        }
    }
}

/// Constraints checked on written values (not on filter values).
#[derive(Clone, Debug, Default)]
pub struct FieldRules {
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub pattern: Option<Regex>,
    pub format: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    pub filterable: bool,
    pub sortable: bool,
    pub searchable: bool,
    pub nullable: bool,
    pub read_only: bool,
    pub required: bool,
    pub unique: bool,
    pub rules: FieldRules,
    pub description: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldSchema {
            name: name.into(),
            kind,
            filterable: false,
            sortable: false,
            searchable: false,
            nullable: false,
            read_only: false,
            required: false,
            unique: false,
            rules: FieldRules::default(),
            description: None,
        }
    }

    pub fn is_id(&self) -> bool {
        matches!(self.kind, FieldKind::Id(_))
    }

    /// Must be present on create and full update: declared required, or unable to hold the null an
    /// omitted field is stored as.
    pub fn required_on_write(&self) -> bool {
        !self.read_only && !self.is_id() && (self.required || !self.nullable)
    }

    /// Type-check and normalize a JSON value. Rules are not applied.
    pub fn coerce(&self, raw: &Value) -> Result<Value, String> {
        if raw.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err("may not be null".into())
            };
        }
        let expected = || format!("expected {}", self.kind.name());
        match &self.kind {
            FieldKind::String | FieldKind::Id(IdKind::Text) => {
                raw.as_str().map(|s| Value::String(s.to_string())).ok_or_else(expected)
            }
            FieldKind::Int | FieldKind::Id(IdKind::Int) => match raw {
                Value::Number(n) if n.is_i64() => Ok(raw.clone()),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
                    _ => Err(expected()),
                },
                _ => Err(expected()),
            },
            FieldKind::Float => raw
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(expected),
            FieldKind::Bool => raw.as_bool().map(Value::Bool).ok_or_else(expected),
            FieldKind::Datetime => raw
                .as_str()
                .and_then(parse_datetime)
                .map(|d| Value::String(format_datetime(&d)))
                .ok_or_else(|| "expected RFC 3339 datetime".to_string()),
            FieldKind::Enum(values) => match raw.as_str() {
                Some(s) if values.iter().any(|v| v == s) => Ok(Value::String(s.to_string())),
                _ => Err(format!("must be one of: {}", values.join(", "))),
            },
            FieldKind::Id(IdKind::Uuid) => raw
                .as_str()
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
                .map(|u| Value::String(u.to_string()))
                .ok_or_else(expected),
        }
    }

    /// Full write-side validation: type check plus configured rules.
    pub fn validate(&self, raw: &Value) -> Result<Value, String> {
        let v = self.coerce(raw)?;
        if v.is_null() {
            return Ok(v);
        }
        let rules = &self.rules;
        if let Some(s) = v.as_str() {
            let len = s.chars().count();
            if let Some(max) = rules.max_length {
                if len > max as usize {
                    return Err(format!("must be at most {} characters", max));
                }
            }
            if let Some(min) = rules.min_length {
                if len < min as usize {
                    return Err(format!("must be at least {} characters", min));
                }
            }
            if let Some(re) = &rules.pattern {
                if !re.is_match(s) {
                    return Err("does not match required pattern".into());
                }
            }
            if let Some(format) = &rules.format {
                validate_format(s, format)?;
            }
        }
        if let Some(n) = v.as_f64() {
            if let Some(min) = rules.minimum {
                if n < min {
                    return Err(format!("must be at least {}", min));
                }
            }
            if let Some(max) = rules.maximum {
                if n > max {
                    return Err(format!("must be at most {}", max));
                }
            }
        }
        Ok(v)
    }

    /// Parse one query-string value into a typed value of this field's kind.
    pub fn parse_query(&self, raw: &str) -> Result<Value, String> {
        let value = match &self.kind {
            FieldKind::Int | FieldKind::Id(IdKind::Int) => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected {}", self.kind.name()))?,
            FieldKind::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("expected {}", self.kind.name()))?,
            FieldKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err("expected boolean".into()),
            },
            _ => Value::String(raw.to_string()),
        };
        self.coerce(&value)
    }

    /// Wire representation of a stored value.
    pub fn serialize(&self, value: &Value) -> Value {
        match (&self.kind, value) {
            (FieldKind::Datetime, Value::String(s)) => parse_datetime(s)
                .map(|d| Value::String(format_datetime(&d)))
                .unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        }
    }
}

/// Accepts RFC 3339 timestamps and bare dates (midnight UTC).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

pub fn format_datetime(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn validate_format(s: &str, format: &str) -> Result<(), String> {
    match format.to_lowercase().as_str() {
        "email" => {
            if !s.contains('@') || s.len() < 3 {
                return Err("must be a valid email".into());
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err("must be a valid UUID".into());
            }
        }
        _ => {}
    }
    Ok(())
}
