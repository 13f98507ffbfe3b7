use crate::core::Value;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Name of the monotonic indexed key every list item carries.
pub const ID_FIELD: &str = "Id";

/// Name of the globally unique identifier field.
pub const UNIQUE_ID_FIELD: &str = "UniqueId";

/// Page size used when the caller does not request one. Doubles as the
/// window span for the range fallback.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// One item as emitted to the caller: an ordered map of field name to value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter, used when seeding test stores.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The indexed key, when present and integral.
    pub fn id(&self) -> Option<i64> {
        self.fields.get(ID_FIELD).and_then(Value::as_integer)
    }

    pub fn unique_id(&self) -> Option<Uuid> {
        self.fields.get(UNIQUE_ID_FIELD).and_then(Value::as_uuid)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the named fields, plus nothing else. Used by stores that
    /// honor a view-field projection.
    pub fn project(&self, fields: &[String]) -> Self {
        let mut projected = Self::new();
        for name in fields {
            if let Some(value) = self.fields.get(name) {
                projected.fields.insert(name.clone(), value.clone());
            }
        }
        projected
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        JsonValue::Object(map)
    }

    pub fn from_json(json: &JsonValue) -> Self {
        let mut record = Self::new();
        if let JsonValue::Object(map) = json {
            for (name, value) in map {
                record.fields.insert(name.clone(), Value::from_json(value));
            }
        }
        record
    }
}

/// Opaque continuation token returned by the store after a page fetch.
///
/// `None` in [`Page::next`] means no further pages. The token is owned by
/// the paginator for the duration of one fetch loop and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One store round trip's worth of records plus the continuation token.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Record>,
    pub next: Option<Cursor>,
}

impl Page {
    pub fn new(records: Vec<Record>, next: Option<Cursor>) -> Self {
        Self { records, next }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A bounded sub-range of the indexed key space: `(low, high]`.
///
/// Exclusive low, inclusive high: with span-aligned windows generated from
/// zero this keeps the maximum key inside the last window, and since ids
/// are assigned from 1 the first window `(0, span]` misses nothing. A key
/// sitting exactly on a boundary belongs to the lower window only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub low: i64,
    pub high: i64,
}

impl Window {
    pub fn new(low: i64, high: i64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, key: i64) -> bool {
        key > self.low && key <= self.high
    }
}
