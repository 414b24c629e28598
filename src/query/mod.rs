//! Backend-independent query: filters, sort, window and search term compiled from the query string.

pub mod cursor;
pub mod filter;
pub mod paginate;
pub mod projection;
pub mod sort;

use crate::config::ResourceDescriptor;
use crate::error::AppError;
use crate::field::FieldKind;
use serde_json::Value;

pub use cursor::CursorToken;
pub use paginate::PageMeta;
pub use projection::Projection;

pub const SORT_PARAM: &str = "sort";
pub const LIMIT_PARAM: &str = "limit";
pub const OFFSET_PARAM: &str = "offset";
pub const CURSOR_PARAM: &str = "cursor";
pub const SEARCH_PARAM: &str = "search";
pub const COUNT_PARAM: &str = "count";
pub const SCHEMA_ONLY_PARAM: &str = "schema_only";
pub const SCHEMA_EXCLUDE_PARAM: &str = "schema_exclude";

/// Query-string keys that never name a filter.
pub const RESERVED_PARAMS: &[&str] = &[
    SORT_PARAM,
    LIMIT_PARAM,
    OFFSET_PARAM,
    CURSOR_PARAM,
    SEARCH_PARAM,
    COUNT_PARAM,
    SCHEMA_ONLY_PARAM,
    SCHEMA_EXCLUDE_PARAM,
];

/// Separator between field name and operator suffix, e.g. `age__gte`.
pub const OPERATOR_SEPARATOR: &str = "__";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Contains,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::In,
        Operator::Contains,
    ];

    pub fn parse(s: &str) -> Option<Operator> {
        Some(match s {
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "in" => Operator::In,
            "contains" => Operator::Contains,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::Contains => "contains",
        }
    }

    /// Operators whose value collapses into a list (repeated keys, comma-separated).
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::Contains)
    }

    pub fn valid_for(&self, kind: &FieldKind) -> bool {
        match self {
            Operator::Eq | Operator::Ne | Operator::In => true,
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => kind.is_ordered(),
            Operator::Contains => kind.is_textual(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Scalar(Value),
    List(Vec<Value>),
}

/// One predicate; a query's filters are AND-combined.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterExpr {
    pub field: String,
    pub op: Operator,
    pub value: FilterValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortSpec(pub Vec<SortKey>);

impl SortSpec {
    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|k| k.field == field)
    }

    /// Query-string form, e.g. "-name,id". Binds cursors to the ordering they were issued under.
    pub fn signature(&self) -> String {
        self.0
            .iter()
            .map(|k| match k.direction {
                Direction::Asc => k.field.clone(),
                Direction::Desc => format!("-{}", k.field),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Window {
    Offset { limit: u32, offset: u64 },
    /// `after` holds the decoded sort-key tuple of the last item already seen; None is the first page.
    Cursor { limit: u32, after: Option<Vec<Value>> },
}

impl Window {
    pub fn limit(&self) -> u32 {
        match self {
            Window::Offset { limit, .. } | Window::Cursor { limit, .. } => *limit,
        }
    }
}

/// Everything a backend needs for one list call. Built once per request.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub filters: Vec<FilterExpr>,
    pub sort: SortSpec,
    pub window: Window,
    pub search: Option<String>,
    pub count: bool,
}

impl Query {
    /// Run all list pipelines against the raw query-string pairs.
    pub fn compile(params: &[(String, String)], resource: &ResourceDescriptor) -> Result<Query, AppError> {
        let filters = filter::compile(params, resource)?;
        let raw_sort = last_value(params, SORT_PARAM);
        let sort = sort::compile(raw_sort, resource)?;
        let window = paginate::compile(params, resource, &sort)?;
        let search = last_value(params, SEARCH_PARAM)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let count = match last_value(params, COUNT_PARAM) {
            Some(v) => parse_flag(v)?,
            None => resource.always_count,
        };
        let query = Query {
            filters,
            sort,
            window,
            search,
            count,
        };
        tracing::debug!(resource = %resource.name, query = ?query, "compiled query");
        Ok(query)
    }
}

pub(crate) fn last_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn parse_flag(v: &str) -> Result<bool, AppError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(AppError::field(COUNT_PARAM, "count must be true or false")),
    }
}

/// Parse a raw query string, keeping repeated keys in order.
pub fn parse_query_string(raw: Option<&str>) -> Result<Vec<(String, String)>, AppError> {
    match raw {
        None | Some("") => Ok(Vec::new()),
        Some(q) => serde_urlencoded::from_str(q).map_err(|e| AppError::validation(format!("invalid query string: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_round_trip_names() {
        for op in Operator::ALL {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
        }
        assert_eq!(Operator::parse("like"), None);
    }

    #[test]
    fn operator_validity_by_kind() {
        assert!(Operator::Contains.valid_for(&FieldKind::String));
        assert!(!Operator::Contains.valid_for(&FieldKind::Int));
        assert!(!Operator::Gt.valid_for(&FieldKind::Bool));
        assert!(Operator::Gte.valid_for(&FieldKind::Datetime));
    }

    #[test]
    fn query_string_keeps_repeats() {
        let params = parse_query_string(Some("age__in=1&age__in=2&name=a%20b")).unwrap();
        assert_eq!(
            params,
            vec![
                ("age__in".to_string(), "1".to_string()),
                ("age__in".to_string(), "2".to_string()),
                ("name".to_string(), "a b".to_string()),
            ]
        );
    }

    #[test]
    fn signature_marks_descending() {
        let spec = SortSpec(vec![SortKey::desc("name"), SortKey::asc("id")]);
        assert_eq!(spec.signature(), "-name,id");
    }
}
