//! In-process document store: the reference adapter.
//!
//! Documents live in per-resource collections behind one `RwLock`; each write holds the lock for
//! its whole read-check-write sequence, so uniqueness checks and id generation are atomic.

use super::{not_found, BackendAdapter, Capabilities, Entity, Page, PageNext, SearchCapability, UpdateMode};
use crate::config::ResourceDescriptor;
use crate::error::AppError;
use crate::field::{FieldKind, IdKind};
use crate::query::{CursorToken, Direction, FilterExpr, FilterValue, Operator, Query, SortSpec, Window};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Collection {
    docs: BTreeMap<String, Entity>,
    last_int_id: i64,
}

pub struct DocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    search: SearchCapability,
}

impl Default for DocumentStore {
    fn default() -> Self {
        DocumentStore::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        DocumentStore {
            collections: RwLock::new(HashMap::new()),
            search: SearchCapability::Substring,
        }
    }

    /// Override the declared search capability (e.g. `None` for a store without search).
    pub fn with_search(mut self, search: SearchCapability) -> Self {
        self.search = search;
        self
    }
}

fn doc_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_of<'a>(resource: &'a ResourceDescriptor, field: &str) -> &'a FieldKind {
    resource
        .field(field)
        .map(|f| &f.kind)
        .unwrap_or(&FieldKind::String)
}

fn matches_filter(resource: &ResourceDescriptor, doc: &Entity, filter: &FilterExpr) -> bool {
    let kind = kind_of(resource, &filter.field);
    let actual = doc.get(&filter.field).unwrap_or(&Value::Null);
    match (&filter.op, &filter.value) {
        (Operator::Eq, FilterValue::Scalar(v)) => kind.compare(actual, v) == Ordering::Equal,
        (Operator::Ne, FilterValue::Scalar(v)) => kind.compare(actual, v) != Ordering::Equal,
        (Operator::In, FilterValue::List(vs)) => {
            !actual.is_null() && vs.iter().any(|v| kind.compare(actual, v) == Ordering::Equal)
        }
        (Operator::Contains, FilterValue::List(terms)) => match actual.as_str() {
            Some(s) => terms.iter().filter_map(Value::as_str).any(|t| s.contains(t)),
            None => false,
        },
        (op, FilterValue::Scalar(v)) => {
            if actual.is_null() {
                return false;
            }
            let ord = kind.compare(actual, v);
            match op {
                Operator::Lt => ord == Ordering::Less,
                Operator::Lte => ord != Ordering::Greater,
                Operator::Gt => ord == Ordering::Greater,
                Operator::Gte => ord != Ordering::Less,
                _ => false,
            }
        }
        _ => false,
    }
}

fn matches_search(resource: &ResourceDescriptor, doc: &Entity, term: &str) -> bool {
    let needle = term.to_lowercase();
    resource.searchable_fields().any(|f| match doc.get(&f.name) {
        Some(Value::String(s)) => s.to_lowercase().contains(&needle),
        _ => false,
    })
}

fn sort_key(sort: &SortSpec, doc: &Entity) -> Vec<Value> {
    sort.keys()
        .iter()
        .map(|k| doc.get(&k.field).cloned().unwrap_or(Value::Null))
        .collect()
}

fn compare_keys(resource: &ResourceDescriptor, sort: &SortSpec, a: &[Value], b: &[Value]) -> Ordering {
    for ((key, x), y) in sort.keys().iter().zip(a).zip(b) {
        let ord = kind_of(resource, &key.field).compare(x, y);
        let ord = match key.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl Collection {
    fn check_unique(&self, resource: &ResourceDescriptor, doc: &Entity, skip: Option<&str>) -> Result<(), AppError> {
        for field in resource.fields.iter().filter(|f| f.unique) {
            let Some(value) = doc.get(&field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self
                .docs
                .iter()
                .filter(|(k, _)| Some(k.as_str()) != skip)
                .any(|(_, other)| {
                    other
                        .get(&field.name)
                        .map(|o| field.kind.compare(o, value) == Ordering::Equal)
                        .unwrap_or(false)
                });
            if clash {
                return Err(AppError::IntegrityError(format!("{} must be unique", field.name)));
            }
        }
        Ok(())
    }

    fn next_id(&mut self, kind: &FieldKind) -> Value {
        match kind {
            FieldKind::Id(IdKind::Int) => {
                self.last_int_id += 1;
                Value::from(self.last_int_id)
            }
            _ => Value::String(uuid::Uuid::new_v4().to_string()),
        }
    }
}

#[async_trait]
impl BackendAdapter for DocumentStore {
    fn name(&self) -> &'static str {
        "document"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            search: self.search,
            cursor: true,
        }
    }

    async fn list(&self, resource: &ResourceDescriptor, query: &Query) -> Result<Page, AppError> {
        let guard = self.collections.read().await;
        let mut matched: Vec<&Entity> = match guard.get(&resource.name) {
            Some(c) => c
                .docs
                .values()
                .filter(|doc| query.filters.iter().all(|f| matches_filter(resource, doc, f)))
                .filter(|doc| match &query.search {
                    Some(term) => matches_search(resource, doc, term),
                    None => true,
                })
                .collect(),
            None => Vec::new(),
        };
        matched.sort_by(|a, b| compare_keys(resource, &query.sort, &sort_key(&query.sort, a), &sort_key(&query.sort, b)));
        let total = query.count.then_some(matched.len() as u64);

        let limit = query.window.limit() as usize;
        let (mut items, start): (Vec<Entity>, u64) = match &query.window {
            Window::Offset { offset, .. } => (
                matched
                    .iter()
                    .skip(*offset as usize)
                    .take(limit + 1)
                    .map(|d| (*d).clone())
                    .collect(),
                *offset,
            ),
            Window::Cursor { after, .. } => (
                matched
                    .iter()
                    .filter(|d| match after {
                        Some(key) => compare_keys(resource, &query.sort, &sort_key(&query.sort, d), key) == Ordering::Greater,
                        None => true,
                    })
                    .take(limit + 1)
                    .map(|d| (*d).clone())
                    .collect(),
                0,
            ),
        };
        let has_more = items.len() > limit;
        items.truncate(limit);
        let next = match (&query.window, items.last()) {
            (_, None) => None,
            _ if !has_more => None,
            (Window::Offset { .. }, Some(_)) => Some(PageNext::Offset(start + limit as u64)),
            (Window::Cursor { .. }, Some(last)) => Some(PageNext::Cursor(CursorToken::for_entity(resource, &query.sort, last)?)),
        };
        Ok(Page { items, total, next })
    }

    async fn get(&self, resource: &ResourceDescriptor, id: &Value) -> Result<Entity, AppError> {
        let guard = self.collections.read().await;
        guard
            .get(&resource.name)
            .and_then(|c| c.docs.get(&doc_key(id)))
            .cloned()
            .ok_or_else(|| not_found(resource, id))
    }

    async fn create(&self, resource: &ResourceDescriptor, fields: Entity) -> Result<Entity, AppError> {
        let mut guard = self.collections.write().await;
        let collection = guard.entry(resource.name.clone()).or_default();
        let id_field = resource.id_field();
        let mut doc = Entity::new();
        for field in &resource.fields {
            doc.insert(field.name.clone(), fields.get(&field.name).cloned().unwrap_or(Value::Null));
        }
        collection.check_unique(resource, &doc, None)?;
        let id = collection.next_id(&id_field.kind);
        doc.insert(id_field.name.clone(), id.clone());
        collection.docs.insert(doc_key(&id), doc.clone());
        tracing::debug!(resource = %resource.name, id = %id, "document created");
        Ok(doc)
    }

    async fn update(
        &self,
        resource: &ResourceDescriptor,
        id: &Value,
        fields: Entity,
        mode: UpdateMode,
    ) -> Result<Entity, AppError> {
        let mut guard = self.collections.write().await;
        let key = doc_key(id);
        let collection = guard.get_mut(&resource.name).ok_or_else(|| not_found(resource, id))?;
        let mut doc = collection.docs.get(&key).cloned().ok_or_else(|| not_found(resource, id))?;
        match mode {
            UpdateMode::Partial => {
                for (k, v) in fields {
                    doc.insert(k, v);
                }
            }
            UpdateMode::Full => {
                for field in resource.writable_fields() {
                    doc.insert(field.name.clone(), fields.get(&field.name).cloned().unwrap_or(Value::Null));
                }
            }
        }
        collection.check_unique(resource, &doc, Some(&key))?;
        collection.docs.insert(key, doc.clone());
        Ok(doc)
    }

    async fn delete(&self, resource: &ResourceDescriptor, id: &Value) -> Result<(), AppError> {
        let mut guard = self.collections.write().await;
        guard
            .get_mut(&resource.name)
            .and_then(|c| c.docs.remove(&doc_key(id)))
            .map(|_| ())
            .ok_or_else(|| not_found(resource, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::people;
    use crate::query::{SortKey, Window};
    use serde_json::json;

    fn entity(v: Value) -> Entity {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn query(filters: Vec<FilterExpr>, sort: SortSpec, window: Window) -> Query {
        Query {
            filters,
            sort,
            window,
            search: None,
            count: false,
        }
    }

    async fn seeded() -> DocumentStore {
        let store = DocumentStore::new();
        let people = people();
        for (name, age) in [("bo", 30), ("al", 20), ("cy", 20), ("di", 40)] {
            store
                .create(&people, entity(json!({"name": name, "age": age})))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn ids_are_generated_in_sequence() {
        let store = seeded().await;
        let p = people();
        let got = store.get(&p, &json!(2)).await.unwrap();
        assert_eq!(got.get("name"), Some(&json!("al")));
        assert_eq!(got.get("bio"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn filters_sort_and_window() {
        let store = seeded().await;
        let p = people();
        let q = query(
            vec![FilterExpr {
                field: "age".into(),
                op: Operator::Gte,
                value: FilterValue::Scalar(json!(20)),
            }],
            SortSpec(vec![SortKey::asc("age"), SortKey::asc("id")]),
            Window::Offset { limit: 2, offset: 0 },
        );
        let page = store.list(&p, &q).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|e| e["name"].clone()).collect();
        assert_eq!(names, vec![json!("al"), json!("cy")]);
        assert_eq!(page.next, Some(PageNext::Offset(2)));
        assert_eq!(page.total, None);
    }

    #[tokio::test]
    async fn empty_result_is_a_page() {
        let store = seeded().await;
        let p = people();
        let mut q = query(
            vec![FilterExpr {
                field: "age".into(),
                op: Operator::Gt,
                value: FilterValue::Scalar(json!(99)),
            }],
            SortSpec(vec![SortKey::asc("id")]),
            Window::Offset { limit: 5, offset: 0 },
        );
        q.count = true;
        let page = store.list(&p, &q).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(0));
        assert_eq!(page.next, None);
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let store = seeded().await;
        let p = people();
        let mut q = query(Vec::new(), SortSpec(vec![SortKey::asc("id")]), Window::Offset { limit: 10, offset: 0 });
        q.search = Some("CY".into());
        let page = store.list(&p, &q).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["name"], json!("cy"));
    }

    #[tokio::test]
    async fn strings_sort_by_code_point() {
        let store = DocumentStore::new();
        let p = people();
        for name in ["bob", "Alice", "alice", "Bob"] {
            store.create(&p, entity(json!({"name": name, "age": 1}))).await.unwrap();
        }
        let q = query(Vec::new(), SortSpec(vec![SortKey::asc("name"), SortKey::asc("id")]), Window::Offset { limit: 10, offset: 0 });
        let page = store.list(&p, &q).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|e| e["name"].clone()).collect();
        assert_eq!(names, vec![json!("Alice"), json!("Bob"), json!("alice"), json!("bob")]);
    }

    #[tokio::test]
    async fn update_and_delete_missing_are_not_found() {
        let store = seeded().await;
        let p = people();
        assert!(matches!(
            store.update(&p, &json!(99), Entity::new(), UpdateMode::Partial).await,
            Err(AppError::NotFound(_))
        ));
        store.delete(&p, &json!(1)).await.unwrap();
        assert!(matches!(store.delete(&p, &json!(1)).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn full_update_nulls_omitted_fields() {
        let store = seeded().await;
        let p = people();
        store
            .update(&p, &json!(1), entity(json!({"bio": "hi"})), UpdateMode::Partial)
            .await
            .unwrap();
        let doc = store
            .update(&p, &json!(1), entity(json!({"name": "bo", "age": 31})), UpdateMode::Full)
            .await
            .unwrap();
        assert_eq!(doc["bio"], Value::Null);
        assert_eq!(doc["age"], json!(31));
        assert_eq!(doc["id"], json!(1));
    }
}
