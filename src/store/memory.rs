//! In-memory list store.
//!
//! A deterministic stand-in for the remote store: seeded lists, monotonic
//! id assignment, structural evaluation of view queries, offset cursors,
//! and a configurable query-cost threshold that rejects expensive queries
//! with the same fault signature the real store uses. Intended for tests
//! and local development.

use crate::core::{
    Cursor, FetchError, Page, Record, Result, Value, ID_FIELD, UNIQUE_ID_FIELD,
};
use crate::fetch::throttle;
use crate::query::markup::Element;
use crate::query::spec::{
    ASCENDING_ATTR, FIELD_REF, NAME_ATTR, ORDER_BY, PAGED_ATTR, QUERY, ROW_LIMIT, TYPE_ATTR,
    VALUE, VIEW_FIELDS, WHERE,
};
use crate::store::ListStore;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;
use tokio::sync::RwLock;
use uuid::Uuid;

struct ListData {
    items: Vec<Record>,
    next_id: i64,
}

pub struct MemoryStore {
    lists: RwLock<HashMap<String, ListData>>,
    /// Queries that would evaluate more rows than this are refused with the
    /// query-cost fault. A row limit of 1 is served as an index seek and is
    /// exempt, which is what makes the max-key probe viable.
    cost_threshold: Option<usize>,
    fetch_calls: AtomicUsize,
    issued_views: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            lists: RwLock::new(HashMap::new()),
            cost_threshold: None,
            fetch_calls: AtomicUsize::new(0),
            issued_views: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cost_threshold(mut self, threshold: usize) -> Self {
        self.cost_threshold = Some(threshold);
        self
    }

    /// Add an item, assigning `Id` and `UniqueId` when the record does not
    /// carry them. The list is created on first insert. Returns the id.
    pub async fn add_item(&self, list: &str, mut record: Record) -> i64 {
        let mut lists = self.lists.write().await;
        let data = lists.entry(list.to_string()).or_insert_with(|| ListData {
            items: Vec::new(),
            next_id: 1,
        });
        let id = match record.id() {
            Some(id) => {
                data.next_id = data.next_id.max(id + 1);
                id
            }
            None => {
                let id = data.next_id;
                data.next_id += 1;
                record.set(ID_FIELD, id);
                id
            }
        };
        if record.unique_id().is_none() {
            record.set(UNIQUE_ID_FIELD, Uuid::new_v4());
        }
        data.items.push(record);
        id
    }

    pub async fn create_list(&self, list: &str) {
        let mut lists = self.lists.write().await;
        lists.entry(list.to_string()).or_insert_with(|| ListData {
            items: Vec::new(),
            next_id: 1,
        });
    }

    /// Number of `fetch_page` round trips served so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(AtomicOrdering::SeqCst)
    }

    /// Rendered view of every `fetch_page` call, in order.
    pub fn issued_views(&self) -> Vec<String> {
        self.issued_views.lock().unwrap().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListStore for MemoryStore {
    async fn fetch_page(
        &self,
        list: &str,
        view: &Element,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        self.fetch_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.issued_views.lock().unwrap().push(view.render());

        let parsed = ParsedView::from_element(view)?;
        let lists = self.lists.read().await;
        let data = lists
            .get(list)
            .ok_or_else(|| FetchError::ListNotFound(list.to_string()))?;

        let mut matched: Vec<&Record> = data
            .items
            .iter()
            .filter(|item| parsed.matches(item))
            .collect();

        if let Some(threshold) = self.cost_threshold {
            if matched.len() > threshold && parsed.row_limit != Some(1) {
                return Err(FetchError::Remote(throttle::query_cost_fault(list)));
            }
        }

        let (order_field, ascending) = parsed
            .order
            .clone()
            .unwrap_or_else(|| (ID_FIELD.to_string(), true));
        matched.sort_by(|a, b| {
            let ord = compare_field(a, b, &order_field);
            if ascending { ord } else { ord.reverse() }
        });

        let offset = match cursor {
            Some(token) => token.as_str().parse::<usize>().map_err(|_| {
                FetchError::Remote(crate::core::StoreFault::new(
                    "InvalidCursor",
                    "ArgumentException",
                    "the continuation token is not valid for this query",
                ))
            })?,
            None => 0,
        };

        let limit = parsed.row_limit.unwrap_or(matched.len().max(1));
        let end = (offset + limit).min(matched.len());
        let records: Vec<Record> = matched
            .get(offset..end)
            .unwrap_or(&[])
            .iter()
            .map(|item| match &parsed.fields {
                Some(fields) => {
                    // The store always returns the indexed key.
                    let mut names = fields.clone();
                    if !names.iter().any(|f| f == ID_FIELD) {
                        names.push(ID_FIELD.to_string());
                    }
                    item.project(&names)
                }
                None => (*item).clone(),
            })
            .collect();

        let next = if parsed.paged && end < matched.len() {
            Some(Cursor::new(end.to_string()))
        } else {
            None
        };

        Ok(Page::new(records, next))
    }

    async fn item_by_id(&self, list: &str, id: i64) -> Result<Record> {
        let lists = self.lists.read().await;
        let data = lists
            .get(list)
            .ok_or_else(|| FetchError::ListNotFound(list.to_string()))?;
        data.items
            .iter()
            .find(|item| item.id() == Some(id))
            .cloned()
            .ok_or_else(|| FetchError::ItemNotFound(list.to_string(), id.to_string()))
    }

    async fn item_by_unique_id(&self, list: &str, unique_id: Uuid) -> Result<Record> {
        let lists = self.lists.read().await;
        let data = lists
            .get(list)
            .ok_or_else(|| FetchError::ListNotFound(list.to_string()))?;
        data.items
            .iter()
            .find(|item| item.unique_id() == Some(unique_id))
            .cloned()
            .ok_or_else(|| FetchError::ItemNotFound(list.to_string(), unique_id.to_string()))
    }
}

/// The parts of a view document this store evaluates.
struct ParsedView {
    fields: Option<Vec<String>>,
    row_limit: Option<usize>,
    paged: bool,
    order: Option<(String, bool)>,
    predicate: Option<Predicate>,
}

enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Cmp(CmpOp, String, Value),
}

#[derive(Clone, Copy)]
enum CmpOp {
    Eq,
    Gt,
    Geq,
    Lt,
    Leq,
}

impl ParsedView {
    fn from_element(view: &Element) -> Result<Self> {
        let fields = view.child(VIEW_FIELDS).map(|vf| {
            vf.children
                .iter()
                .filter(|c| c.name == FIELD_REF)
                .filter_map(|c| c.attr(NAME_ATTR).map(str::to_string))
                .collect()
        });

        let (row_limit, paged) = match view.child(ROW_LIMIT) {
            Some(limit) => {
                let rows = limit
                    .text
                    .as_deref()
                    .unwrap_or("")
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| {
                        FetchError::MalformedQuery("row limit is not a number".to_string())
                    })?;
                (Some(rows), limit.attr(PAGED_ATTR) == Some("TRUE"))
            }
            None => (None, false),
        };

        let query = view.child(QUERY);
        let predicate = match query.and_then(|q| q.child(WHERE)) {
            Some(where_el) => {
                let inner = where_el.children.first().ok_or_else(|| {
                    FetchError::MalformedQuery("empty Where clause".to_string())
                })?;
                Some(parse_predicate(inner)?)
            }
            None => None,
        };

        let order = query
            .and_then(|q| q.child(ORDER_BY))
            .and_then(|o| o.child(FIELD_REF))
            .and_then(|f| {
                f.attr(NAME_ATTR).map(|name| {
                    (name.to_string(), f.attr(ASCENDING_ATTR) != Some("FALSE"))
                })
            });

        Ok(Self {
            fields,
            row_limit,
            paged,
            order,
            predicate,
        })
    }

    fn matches(&self, record: &Record) -> bool {
        match &self.predicate {
            Some(predicate) => eval_predicate(predicate, record),
            None => true,
        }
    }
}

fn parse_predicate(el: &Element) -> Result<Predicate> {
    match el.name.as_str() {
        "And" | "Or" => {
            if el.children.len() != 2 {
                return Err(FetchError::MalformedQuery(format!(
                    "<{}> requires exactly two operands",
                    el.name
                )));
            }
            let left = Box::new(parse_predicate(&el.children[0])?);
            let right = Box::new(parse_predicate(&el.children[1])?);
            Ok(if el.name == "And" {
                Predicate::And(left, right)
            } else {
                Predicate::Or(left, right)
            })
        }
        "Eq" | "Gt" | "Geq" | "Lt" | "Leq" => {
            let op = match el.name.as_str() {
                "Eq" => CmpOp::Eq,
                "Gt" => CmpOp::Gt,
                "Geq" => CmpOp::Geq,
                "Lt" => CmpOp::Lt,
                _ => CmpOp::Leq,
            };
            let field = el
                .child(FIELD_REF)
                .and_then(|f| f.attr(NAME_ATTR))
                .ok_or_else(|| {
                    FetchError::MalformedQuery(format!("<{}> is missing a FieldRef", el.name))
                })?;
            let value_el = el.child(VALUE).ok_or_else(|| {
                FetchError::MalformedQuery(format!("<{}> is missing a Value", el.name))
            })?;
            let raw = value_el.text.as_deref().unwrap_or("");
            let value = match value_el.attr(TYPE_ATTR) {
                Some("Text") => Value::Text(raw.to_string()),
                _ => match raw.trim().parse::<i64>() {
                    Ok(n) => Value::Integer(n),
                    Err(_) => Value::Text(raw.to_string()),
                },
            };
            Ok(Predicate::Cmp(op, field.to_string(), value))
        }
        other => Err(FetchError::MalformedQuery(format!(
            "unsupported predicate element <{}>",
            other
        ))),
    }
}

fn eval_predicate(predicate: &Predicate, record: &Record) -> bool {
    match predicate {
        Predicate::And(left, right) => {
            eval_predicate(left, record) && eval_predicate(right, record)
        }
        Predicate::Or(left, right) => {
            eval_predicate(left, record) || eval_predicate(right, record)
        }
        Predicate::Cmp(op, field, expected) => {
            let Some(actual) = record.get(field) else {
                return false;
            };
            let Some(ord) = compare_values(actual, expected) else {
                return false;
            };
            match op {
                CmpOp::Eq => ord == Ordering::Equal,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Geq => ord != Ordering::Less,
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Leq => ord != Ordering::Greater,
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Integer(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Integer(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::spec::{build_max_key_probe, build_view, build_window_view, QuerySpec};
    use crate::core::Window;

    async fn seeded(n: i64) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 1..=n {
            store
                .add_item("tasks", Record::new().with("Title", format!("task {}", i)))
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_assigns_monotonic_ids() {
        let store = seeded(3).await;
        let item = store.item_by_id("tasks", 2).await.unwrap();
        assert_eq!(item.get("Title"), Some(&Value::Text("task 2".into())));
        assert!(item.unique_id().is_some());
    }

    #[tokio::test]
    async fn test_paged_fetch_and_cursor() {
        let store = seeded(5).await;
        let view = build_view(&QuerySpec::new().page_size(2)).unwrap();

        let first = store.fetch_page("tasks", &view, None).await.unwrap();
        assert_eq!(first.len(), 2);
        let cursor = first.next.clone().unwrap();

        let second = store.fetch_page("tasks", &view, Some(&cursor)).await.unwrap();
        assert_eq!(second.len(), 2);

        let third = store
            .fetch_page("tasks", &view, second.next.as_ref())
            .await
            .unwrap();
        assert_eq!(third.len(), 1);
        assert!(third.next.is_none());
    }

    #[tokio::test]
    async fn test_cost_threshold_refuses_wide_queries() {
        let store = MemoryStore::new().with_cost_threshold(5);
        for i in 1..=10 {
            store
                .add_item("tasks", Record::new().with("Title", format!("task {}", i)))
                .await;
        }
        let view = build_view(&QuerySpec::new().page_size(3)).unwrap();
        let err = store.fetch_page("tasks", &view, None).await.unwrap_err();
        assert!(crate::fetch::throttle::is_throttled(&err));
    }

    #[tokio::test]
    async fn test_probe_is_exempt_from_cost_threshold() {
        let store = MemoryStore::new().with_cost_threshold(5);
        for i in 1..=10 {
            store
                .add_item("tasks", Record::new().with("Title", format!("task {}", i)))
                .await;
        }
        let probe = build_max_key_probe();
        let page = store.fetch_page("tasks", &probe, None).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.records[0].id(), Some(10));
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_window_query_filters_by_range() {
        let store = seeded(10).await;
        let view =
            build_window_view(&QuerySpec::new().page_size(100), Window::new(3, 7)).unwrap();
        let page = store.fetch_page("tasks", &view, None).await.unwrap();
        let ids: Vec<i64> = page.records.iter().filter_map(Record::id).collect();
        assert_eq!(ids, vec![4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn test_unknown_list() {
        let store = MemoryStore::new();
        let view = build_view(&QuerySpec::new()).unwrap();
        assert!(matches!(
            store.fetch_page("nope", &view, None).await,
            Err(FetchError::ListNotFound(_))
        ));
    }
}
