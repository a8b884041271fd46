use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::StoreError;

// ============================================================================
// Documents - JSON bodies keyed by (collection, id)
// ============================================================================

/// Field map of a stored document
pub type Fields = Map<String, Value>;

/// Collection names used by the admin application
pub mod collections {
    pub const ORDERS: &str = "orders";
    pub const PRODUCTS: &str = "products";
    pub const CATEGORIES: &str = "categories";
    /// One document per taken category name, keyed by the name
    pub const CATEGORY_NAMES: &str = "category_names";
    pub const CUSTOMERS: &str = "customers";
    pub const CONVERSATIONS: &str = "conversations";
    pub const ADMINS: &str = "admins";

    /// Messages live in a per-conversation subcollection
    pub fn messages(conversation_id: &str) -> String {
        format!("{}/{}/messages", CONVERSATIONS, conversation_id)
    }
}

/// Reference to a single document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self { id: id.into(), data }
    }

    /// Look up a (possibly dotted) field path
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup(&self.data, path)
    }

    /// Decode into a typed model; the document id is exposed as the `id` field
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data)).map_err(|e| {
            StoreError::Internal(format!("malformed document {}: {}", self.id, e))
        })
    }
}

/// Encode a typed model into document fields. Any `id` field is dropped,
/// the id lives in the document key.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        other => Err(StoreError::InvalidArgument(format!(
            "documents must encode to an object, got {}",
            other
        ))),
    }
}

/// Resolve a dotted path (`unreadCount.alice`) inside a field map
pub fn lookup<'a>(data: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = data.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write a value at a dotted path, creating intermediate maps
pub fn set_path(data: &mut Fields, path: &str, value: Value) -> Result<(), StoreError> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| StoreError::InvalidArgument("empty field path".to_string()))?;

    let mut current = data;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just replaced with an object"),
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Remove the value at a dotted path, if present
pub fn remove_path(data: &mut Fields, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = data;
    for segment in parents {
        match current.get_mut(*segment) {
            Some(Value::Object(map)) => current = map,
            _ => return,
        }
    }
    current.remove(*last);
}

/// Timestamps are stored the way chrono serializes them (RFC 3339)
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

/// Ordering used by range filters and sorts. Numbers compare numerically,
/// RFC 3339 strings compare as instants, other strings lexicographically.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(tx), Ok(ty)) => Some(tx.cmp(&ty)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}
