use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};

use super::document::{
    compare_values, lookup, remove_path, set_path, timestamp_value, values_equal, DocRef, Fields,
};
use super::error::StoreError;

// ============================================================================
// Write Batches - All-or-nothing multi-document writes
// ============================================================================
//
// A batch is a list of writes plus guards. Stores stage every write on a
// copy of the affected documents and only persist the result when every
// write applied cleanly and every guard held. Guards come in two flavours:
//
// - FieldOneOf:   checked against the state before any write of the batch
// - FieldAtLeast: checked against the staged state after all writes
//
// ============================================================================

/// A single field mutation inside an update
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMutation {
    Set(Value),
    /// Relative numeric change; a missing field counts as zero
    Increment(i64),
    /// Resolved to the commit time
    ServerTimestamp,
    /// Append values not already present in the array
    ArrayUnion(Vec<Value>),
    Delete,
}

/// Ordered field mutations for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates(Vec<(String, FieldMutation)>);

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.push((field.to_string(), FieldMutation::Set(value.into())));
        self
    }

    pub fn increment(mut self, field: &str, by: i64) -> Self {
        self.0.push((field.to_string(), FieldMutation::Increment(by)));
        self
    }

    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.0.push((field.to_string(), FieldMutation::ServerTimestamp));
        self
    }

    pub fn array_union(mut self, field: &str, values: Vec<Value>) -> Self {
        self.0.push((field.to_string(), FieldMutation::ArrayUnion(values)));
        self
    }

    pub fn delete(mut self, field: &str) -> Self {
        self.0.push((field.to_string(), FieldMutation::Delete));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldMutation)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Fails with `already-exists` if the document is present
    Create { doc: DocRef, data: Fields },
    /// Upsert, replacing the whole body
    Set { doc: DocRef, data: Fields },
    /// Fails with `not-found` if the document is absent
    Update { doc: DocRef, fields: FieldUpdates },
    Delete { doc: DocRef },
}

impl Write {
    pub fn doc(&self) -> &DocRef {
        match self {
            Write::Create { doc, .. }
            | Write::Set { doc, .. }
            | Write::Update { doc, .. }
            | Write::Delete { doc } => doc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    FieldOneOf {
        doc: DocRef,
        field: String,
        allowed: Vec<Value>,
    },
    FieldAtLeast {
        doc: DocRef,
        field: String,
        min: f64,
    },
}

impl Guard {
    pub fn doc(&self) -> &DocRef {
        match self {
            Guard::FieldOneOf { doc, .. } | Guard::FieldAtLeast { doc, .. } => doc,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
    guards: Vec<Guard>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, doc: DocRef, data: Fields) -> &mut Self {
        self.writes.push(Write::Create { doc, data });
        self
    }

    pub fn set(&mut self, doc: DocRef, data: Fields) -> &mut Self {
        self.writes.push(Write::Set { doc, data });
        self
    }

    pub fn update(&mut self, doc: DocRef, fields: FieldUpdates) -> &mut Self {
        self.writes.push(Write::Update { doc, fields });
        self
    }

    pub fn delete(&mut self, doc: DocRef) -> &mut Self {
        self.writes.push(Write::Delete { doc });
        self
    }

    /// Abort the batch unless `field` currently equals `expected`
    pub fn require_equals(&mut self, doc: DocRef, field: &str, expected: impl Into<Value>) -> &mut Self {
        self.require_one_of(doc, field, vec![expected.into()])
    }

    /// Abort the batch unless `field` currently holds one of `allowed`
    pub fn require_one_of(&mut self, doc: DocRef, field: &str, allowed: Vec<Value>) -> &mut Self {
        self.guards.push(Guard::FieldOneOf {
            doc,
            field: field.to_string(),
            allowed,
        });
        self
    }

    /// Abort the batch if `field` ends up below `min` once all writes applied
    pub fn require_at_least(&mut self, doc: DocRef, field: &str, min: f64) -> &mut Self {
        self.guards.push(Guard::FieldAtLeast {
            doc,
            field: field.to_string(),
            min,
        });
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Every document the batch reads or writes, in a stable order
    pub fn touched(&self) -> BTreeSet<DocRef> {
        self.writes
            .iter()
            .map(Write::doc)
            .chain(self.guards.iter().map(Guard::doc))
            .cloned()
            .collect()
    }

    /// Documents whose state must be persisted after a successful commit
    pub fn written(&self) -> BTreeSet<DocRef> {
        self.writes.iter().map(Write::doc).cloned().collect()
    }

    /// Documents the batch creates with `Create`
    pub fn created(&self) -> BTreeSet<DocRef> {
        self.writes
            .iter()
            .filter_map(|write| match write {
                Write::Create { doc, .. } => Some(doc.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub writes: usize,
    pub committed_at: DateTime<Utc>,
}

/// Snapshot of the touched documents; `None` means absent (or deleted)
pub type Staging = BTreeMap<DocRef, Option<Fields>>;

/// Apply a batch to a staging snapshot. The snapshot must contain an entry
/// for every document in `batch.touched()`. On error the caller discards
/// the snapshot, so nothing partial is ever persisted.
pub fn stage(batch: &WriteBatch, mut staging: Staging, now: DateTime<Utc>) -> Result<Staging, StoreError> {
    for guard in batch.guards() {
        if let Guard::FieldOneOf { doc, field, allowed } = guard {
            let current = staging
                .get(doc)
                .and_then(Option::as_ref)
                .ok_or_else(|| StoreError::NotFound(doc.to_string()))?;
            let actual = lookup(current, field);
            let holds = actual
                .map(|v| allowed.iter().any(|expected| values_equal(v, expected)))
                .unwrap_or(false);
            if !holds {
                return Err(StoreError::FailedPrecondition {
                    doc: doc.to_string(),
                    field: field.clone(),
                    actual: actual.cloned(),
                    reason: format!("expected one of {}", Value::Array(allowed.clone())),
                });
            }
        }
    }

    for write in batch.writes() {
        match write {
            Write::Create { doc, data } => {
                let slot = staging.entry(doc.clone()).or_insert(None);
                if slot.is_some() {
                    return Err(StoreError::AlreadyExists(doc.to_string()));
                }
                *slot = Some(resolve_timestamps(data.clone(), now));
            }
            Write::Set { doc, data } => {
                staging.insert(doc.clone(), Some(resolve_timestamps(data.clone(), now)));
            }
            Write::Update { doc, fields } => {
                let current = staging
                    .get_mut(doc)
                    .and_then(Option::as_mut)
                    .ok_or_else(|| StoreError::NotFound(doc.to_string()))?;
                apply_updates(current, fields, now)
                    .map_err(|e| annotate(e, doc))?;
            }
            Write::Delete { doc } => {
                staging.insert(doc.clone(), None);
            }
        }
    }

    for guard in batch.guards() {
        if let Guard::FieldAtLeast { doc, field, min } = guard {
            let current = staging
                .get(doc)
                .and_then(Option::as_ref)
                .ok_or_else(|| StoreError::NotFound(doc.to_string()))?;
            let actual = lookup(current, field);
            let holds = actual
                .map(|v| {
                    matches!(
                        compare_values(v, &Value::from(*min)),
                        Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                    )
                })
                .unwrap_or(false);
            if !holds {
                return Err(StoreError::FailedPrecondition {
                    doc: doc.to_string(),
                    field: field.clone(),
                    actual: actual.cloned(),
                    reason: format!("must be at least {}", min),
                });
            }
        }
    }

    Ok(staging)
}

fn annotate(err: StoreError, doc: &DocRef) -> StoreError {
    match err {
        StoreError::InvalidArgument(msg) => StoreError::InvalidArgument(format!("{}: {}", doc, msg)),
        other => other,
    }
}

fn apply_updates(data: &mut Fields, updates: &FieldUpdates, now: DateTime<Utc>) -> Result<(), StoreError> {
    for (field, mutation) in updates.iter() {
        match mutation {
            FieldMutation::Set(value) => set_path(data, field, value.clone())?,
            FieldMutation::ServerTimestamp => set_path(data, field, timestamp_value(now))?,
            FieldMutation::Increment(by) => {
                let next = match lookup(data, field) {
                    None | Some(Value::Null) => Value::from(*by),
                    Some(Value::Number(n)) => increment_number(n, *by)?,
                    Some(other) => {
                        return Err(StoreError::InvalidArgument(format!(
                            "cannot increment non-numeric field {} ({})",
                            field, other
                        )))
                    }
                };
                set_path(data, field, next)?;
            }
            FieldMutation::ArrayUnion(values) => {
                let mut items = match lookup(data, field) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(items)) => items.clone(),
                    Some(other) => {
                        return Err(StoreError::InvalidArgument(format!(
                            "cannot union into non-array field {} ({})",
                            field, other
                        )))
                    }
                };
                for value in values {
                    if !items.iter().any(|existing| values_equal(existing, value)) {
                        items.push(value.clone());
                    }
                }
                set_path(data, field, Value::Array(items))?;
            }
            FieldMutation::Delete => remove_path(data, field),
        }
    }
    Ok(())
}

fn increment_number(current: &Number, by: i64) -> Result<Value, StoreError> {
    if let Some(i) = current.as_i64() {
        return i
            .checked_add(by)
            .map(Value::from)
            .ok_or_else(|| StoreError::InvalidArgument("integer overflow on increment".to_string()));
    }
    let f = current
        .as_f64()
        .ok_or_else(|| StoreError::InvalidArgument("unrepresentable number".to_string()))?;
    Number::from_f64(f + by as f64)
        .map(Value::Number)
        .ok_or_else(|| StoreError::InvalidArgument("non-finite number".to_string()))
}

/// Bodies written with `Create`/`Set` may carry the `__serverTimestamp__`
/// sentinel in top-level fields
pub const SERVER_TIMESTAMP: &str = "__serverTimestamp__";

fn resolve_timestamps(mut data: Fields, now: DateTime<Utc>) -> Fields {
    for value in data.values_mut() {
        if value.as_str() == Some(SERVER_TIMESTAMP) {
            *value = timestamp_value(now);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn order_ref() -> DocRef {
        DocRef::new("orders", "o1")
    }

    fn product_ref() -> DocRef {
        DocRef::new("products", "p1")
    }

    fn staging() -> Staging {
        let mut staging = Staging::new();
        staging.insert(order_ref(), Some(fields(json!({"status": "placed"}))));
        staging.insert(product_ref(), Some(fields(json!({"stock": 20}))));
        staging
    }

    #[test]
    fn test_update_and_increment() {
        let mut batch = WriteBatch::new();
        batch
            .update(order_ref(), FieldUpdates::new().set("status", "accepted").server_timestamp("updatedAt"))
            .update(product_ref(), FieldUpdates::new().increment("stock", -5));

        let staged = stage(&batch, staging(), Utc::now()).unwrap();
        let order = staged[&order_ref()].as_ref().unwrap();
        let product = staged[&product_ref()].as_ref().unwrap();

        assert_eq!(order["status"], json!("accepted"));
        assert!(order.contains_key("updatedAt"));
        assert_eq!(product["stock"], json!(15));
    }

    #[test]
    fn test_equals_guard_uses_pre_batch_state() {
        let mut batch = WriteBatch::new();
        batch
            .require_equals(order_ref(), "status", "accepted")
            .update(order_ref(), FieldUpdates::new().set("status", "accepted"));

        let err = stage(&batch, staging(), Utc::now()).unwrap_err();
        match err {
            StoreError::FailedPrecondition { field, actual, .. } => {
                assert_eq!(field, "status");
                assert_eq!(actual, Some(json!("placed")));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_one_of_guard_accepts_any_listed_value() {
        let mut batch = WriteBatch::new();
        batch
            .require_one_of(order_ref(), "status", vec![json!("pending"), json!("placed")])
            .update(order_ref(), FieldUpdates::new().set("status", "accepted"));

        let staged = stage(&batch, staging(), Utc::now()).unwrap();
        let order = staged[&order_ref()].as_ref().unwrap();
        assert_eq!(order["status"], json!("accepted"));
    }

    #[test]
    fn test_at_least_guard_uses_staged_state() {
        let mut batch = WriteBatch::new();
        batch
            .update(product_ref(), FieldUpdates::new().increment("stock", -15))
            .update(product_ref(), FieldUpdates::new().increment("stock", -10))
            .require_at_least(product_ref(), "stock", 0.0);

        assert!(matches!(
            stage(&batch, staging(), Utc::now()),
            Err(StoreError::FailedPrecondition { .. })
        ));
    }

    #[test]
    fn test_update_missing_document_is_not_found() {
        let mut batch = WriteBatch::new();
        let missing = DocRef::new("products", "ghost");
        batch.update(missing.clone(), FieldUpdates::new().increment("stock", -1));

        let mut snapshot = staging();
        snapshot.insert(missing, None);
        let err = stage(&batch, snapshot, Utc::now()).unwrap_err();
        assert_eq!(err.missing_document(), Some("products/ghost"));
    }

    #[test]
    fn test_create_rejects_existing() {
        let mut batch = WriteBatch::new();
        batch.create(order_ref(), Fields::new());
        assert!(matches!(
            stage(&batch, staging(), Utc::now()),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_array_union_skips_duplicates() {
        let mut snapshot = Staging::new();
        let msg = DocRef::new("conversations/a_b/messages", "m1");
        snapshot.insert(msg.clone(), Some(fields(json!({"deletedFor": ["a"]}))));

        let mut batch = WriteBatch::new();
        batch.update(msg.clone(), FieldUpdates::new().array_union("deletedFor", vec![json!("a"), json!("b")]));

        let staged = stage(&batch, snapshot, Utc::now()).unwrap();
        assert_eq!(staged[&msg].as_ref().unwrap()["deletedFor"], json!(["a", "b"]));
    }

    #[test]
    fn test_server_timestamp_sentinel_in_create() {
        let doc = DocRef::new("orders", "new");
        let mut snapshot = Staging::new();
        snapshot.insert(doc.clone(), None);

        let mut batch = WriteBatch::new();
        batch.create(doc.clone(), fields(json!({"createdAt": SERVER_TIMESTAMP})));

        let now = Utc::now();
        let staged = stage(&batch, snapshot, now).unwrap();
        assert_eq!(staged[&doc].as_ref().unwrap()["createdAt"], timestamp_value(now));
    }

    #[test]
    fn test_touched_and_written_sets() {
        let mut batch = WriteBatch::new();
        batch
            .require_equals(order_ref(), "status", "placed")
            .update(product_ref(), FieldUpdates::new().increment("stock", -1));

        assert_eq!(batch.touched().len(), 2);
        assert_eq!(batch.written().len(), 1);
        assert!(batch.written().contains(&product_ref()));
    }
}
