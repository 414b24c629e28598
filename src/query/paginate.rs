//! Paginator: limit/offset or cursor params to a bounded window, and page metadata for responses.

use super::{cursor::CursorToken, last_value, SortSpec, Window, CURSOR_PARAM, LIMIT_PARAM, OFFSET_PARAM};
use crate::backend::{Page, PageNext};
use crate::config::ResourceDescriptor;
use crate::error::AppError;
use serde::Serialize;
use serde_json::Value;

/// Build the window for a list request. `limit = min(requested or default, max)`; offset below 0 clamps to 0.
/// A `cursor` key switches to cursor mode; an empty cursor value is the first page.
pub fn compile(params: &[(String, String)], resource: &ResourceDescriptor, sort: &SortSpec) -> Result<Window, AppError> {
    let limit = match last_value(params, LIMIT_PARAM).map(str::trim).filter(|s| !s.is_empty()) {
        None => resource.default_page_size,
        Some(raw) => {
            let n: i64 = raw
                .parse()
                .map_err(|_| AppError::InvalidPagination(format!("limit '{}' is not an integer", raw)))?;
            if n < 1 {
                return Err(AppError::InvalidPagination("limit must be at least 1".into()));
            }
            u32::try_from(n).unwrap_or(u32::MAX)
        }
    }
    .min(resource.max_page_size)
    .max(1);

    if let Some(token) = last_value(params, CURSOR_PARAM) {
        if last_value(params, OFFSET_PARAM).is_some() {
            return Err(AppError::InvalidPagination("cursor and offset cannot be combined".into()));
        }
        let token = token.trim();
        let after = if token.is_empty() {
            None
        } else {
            Some(CursorToken::decode(token, resource, sort)?)
        };
        return Ok(Window::Cursor { limit, after });
    }

    let offset = match last_value(params, OFFSET_PARAM).map(str::trim).filter(|s| !s.is_empty()) {
        None => 0,
        Some(raw) => {
            let n: i64 = raw
                .parse()
                .map_err(|_| AppError::InvalidPagination(format!("offset '{}' is not an integer", raw)))?;
            n.max(0) as u64
        }
    };
    Ok(Window::Offset { limit, offset })
}

/// Pagination metadata derived from a page and the window that produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    pub has_next: bool,
    /// Offset (number) or cursor (string) to request the following page with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Value>,
}

pub fn format(page: &Page, window: &Window) -> PageMeta {
    let limit = window.limit();
    let offset = match window {
        Window::Offset { offset, .. } => Some(*offset),
        Window::Cursor { .. } => None,
    };
    let next = page.next.as_ref().map(|n| match n {
        PageNext::Offset(o) => Value::from(*o),
        PageNext::Cursor(c) => Value::String(c.clone()),
    });
    PageMeta {
        total: page.total,
        total_pages: page.total.map(|t| t.div_ceil(u64::from(limit))),
        limit,
        offset,
        has_next: next.is_some(),
        next,
    }
}

impl PageMeta {
    /// Response headers: `x-total` only when counted, `x-offset` only in offset mode.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::with_capacity(3);
        if let Some(total) = self.total {
            out.push(("x-total", total.to_string()));
        }
        out.push(("x-limit", self.limit.to_string()));
        if let Some(offset) = self.offset {
            out.push(("x-offset", offset.to_string()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::people;
    use crate::query::SortKey;
    use serde_json::json;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn sort() -> SortSpec {
        SortSpec(vec![SortKey::asc("name"), SortKey::asc("id")])
    }

    #[test]
    fn defaults_apply() {
        let w = compile(&[], &people(), &sort()).unwrap();
        assert_eq!(w, Window::Offset { limit: 10, offset: 0 });
    }

    #[test]
    fn limit_is_clamped_to_max() {
        let w = compile(&pairs(&[("limit", "1000"), ("offset", "-4")]), &people(), &sort()).unwrap();
        assert_eq!(w, Window::Offset { limit: 50, offset: 0 });
    }

    #[test]
    fn zero_or_garbage_limit_fails() {
        assert!(matches!(
            compile(&pairs(&[("limit", "0")]), &people(), &sort()),
            Err(AppError::InvalidPagination(_))
        ));
        assert!(matches!(
            compile(&pairs(&[("limit", "ten")]), &people(), &sort()),
            Err(AppError::InvalidPagination(_))
        ));
    }

    #[test]
    fn empty_cursor_is_first_page() {
        let w = compile(&pairs(&[("cursor", ""), ("limit", "5")]), &people(), &sort()).unwrap();
        assert_eq!(w, Window::Cursor { limit: 5, after: None });
    }

    #[test]
    fn cursor_is_decoded() {
        let token = CursorToken::encode("people", &sort(), &[json!("bo"), json!(2)]).unwrap();
        let w = compile(&pairs(&[("cursor", &token)]), &people(), &sort()).unwrap();
        assert_eq!(
            w,
            Window::Cursor {
                limit: 10,
                after: Some(vec![json!("bo"), json!(2)])
            }
        );
    }

    #[test]
    fn bad_cursor_fails() {
        assert!(matches!(
            compile(&pairs(&[("cursor", "zzz")]), &people(), &sort()),
            Err(AppError::InvalidCursor)
        ));
    }

    #[test]
    fn format_keeps_absent_total_absent() {
        let page = Page {
            items: Vec::new(),
            total: None,
            next: None,
        };
        let meta = format(&page, &Window::Offset { limit: 10, offset: 0 });
        assert_eq!(meta.total, None);
        assert!(!meta.has_next);
        assert_eq!(meta.headers(), vec![("x-limit", "10".to_string()), ("x-offset", "0".to_string())]);
    }

    #[test]
    fn format_counts_pages() {
        let page = Page {
            items: Vec::new(),
            total: Some(21),
            next: Some(PageNext::Offset(10)),
        };
        let meta = format(&page, &Window::Offset { limit: 10, offset: 0 });
        assert_eq!(meta.total_pages, Some(3));
        assert_eq!(meta.next, Some(json!(10)));
        assert!(meta.has_next);
    }
}
