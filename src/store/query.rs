use std::cmp::Ordering;

use serde_json::Value;

use super::document::{compare_values, values_equal, Document};

// ============================================================================
// Queries - Client-evaluated filters over a collection
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    Ne(Value),
    Gte(Value),
    Lte(Value),
    In(Vec<Value>),
    ArrayContains(Value),
    /// Case-sensitive string prefix (the `>= term` / `<= term + \u{f8ff}` range)
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(value) = doc.field(&self.field) else {
            // Documents lacking the field never match, not even `Ne`
            return false;
        };

        match &self.op {
            FilterOp::Eq(expected) => values_equal(value, expected),
            FilterOp::Ne(expected) => !values_equal(value, expected),
            FilterOp::Gte(bound) => matches!(
                compare_values(value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lte(bound) => matches!(
                compare_values(value, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::In(allowed) => allowed.iter().any(|candidate| values_equal(value, candidate)),
            FilterOp::ArrayContains(needle) => value
                .as_array()
                .map(|items| items.iter().any(|item| values_equal(item, needle)))
                .unwrap_or(false),
            FilterOp::Prefix(prefix) => value
                .as_str()
                .map(|s| s.starts_with(prefix.as_str()))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    fn with(mut self, field: &str, op: FilterOp) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
        });
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, FilterOp::Eq(value.into()))
    }

    pub fn where_ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, FilterOp::Ne(value.into()))
    }

    pub fn where_gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, FilterOp::Gte(value.into()))
    }

    pub fn where_lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, FilterOp::Lte(value.into()))
    }

    pub fn where_in(self, field: &str, values: Vec<Value>) -> Self {
        self.with(field, FilterOp::In(values))
    }

    pub fn array_contains(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, FilterOp::ArrayContains(value.into()))
    }

    pub fn starts_with(self, field: &str, prefix: impl Into<String>) -> Self {
        self.with(field, FilterOp::Prefix(prefix.into()))
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|filter| filter.matches(doc))
    }

    /// Filter, sort and truncate a collection snapshot
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();

        if let Some((field, direction)) = &self.order_by {
            // Ordering by a field excludes documents that lack it
            matched.retain(|d| d.field(field).is_some());
            matched.sort_by(|a, b| {
                let ord = match (a.field(field), b.field(field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }

        matched
    }
}
