//! # List Query Predicates
//!
//! Filter, ordering and pagination predicates for `RemoteStore::list`,
//! composed as an ordered list.
//!
//! ## Evaluation Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ListQuery Evaluation                                 │
//! │                                                                         │
//! │  all records in collection                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. FILTERS (Equal / GreaterThan / ... applied as AND)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. TOTAL counted here ← pagination never changes the total            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. ORDERING (first order predicate = primary sort key)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. OFFSET then LIMIT                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RecordPage { items, total }                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both store implementations evaluate predicates over decoded records:
//! fields are opaque JSON, so there is no SQL pushdown to express them
//! against.

use serde_json::Value;
use std::cmp::Ordering;

use sodi_core::{Record, RecordPage};

// =============================================================================
// Predicates
// =============================================================================

/// One predicate in a list query.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Keep records whose field equals the value.
    Equal { field: String, value: Value },
    /// Keep records whose field is strictly greater than the value.
    GreaterThan { field: String, value: Value },
    /// Keep records whose field is greater than or equal to the value.
    GreaterThanOrEqual { field: String, value: Value },
    /// Keep records whose field is strictly less than the value.
    LessThan { field: String, value: Value },
    /// Keep records whose field is less than or equal to the value.
    LessThanOrEqual { field: String, value: Value },
    /// Sort ascending by field. The first order predicate is the primary key.
    OrderAsc(String),
    /// Sort descending by field.
    OrderDesc(String),
    /// Return at most this many records.
    Limit(u64),
    /// Skip this many records before returning.
    Offset(u64),
}

// =============================================================================
// List Query
// =============================================================================

/// An ordered list of predicates, built fluently.
///
/// ## Example
/// ```rust
/// use sodi_store::query::ListQuery;
/// use serde_json::json;
///
/// let query = ListQuery::new()
///     .equal("client_id", json!("c1"))
///     .order_desc("created_at")
///     .limit(25);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    predicates: Vec<Predicate>,
}

impl ListQuery {
    pub fn new() -> Self {
        ListQuery::default()
    }

    pub fn equal(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::Equal {
            field: field.into(),
            value,
        });
        self
    }

    pub fn greater_than(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::GreaterThan {
            field: field.into(),
            value,
        });
        self
    }

    pub fn greater_than_or_equal(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::GreaterThanOrEqual {
            field: field.into(),
            value,
        });
        self
    }

    pub fn less_than(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::LessThan {
            field: field.into(),
            value,
        });
        self
    }

    pub fn less_than_or_equal(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::LessThanOrEqual {
            field: field.into(),
            value,
        });
        self
    }

    pub fn order_asc(mut self, field: impl Into<String>) -> Self {
        self.predicates.push(Predicate::OrderAsc(field.into()));
        self
    }

    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.predicates.push(Predicate::OrderDesc(field.into()));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.predicates.push(Predicate::Limit(limit));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.predicates.push(Predicate::Offset(offset));
        self
    }

    /// The predicates, in composition order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// A stable cache key for this query's result.
    ///
    /// Two structurally identical queries map to the same cache entry.
    pub fn cache_key(&self) -> String {
        if self.predicates.is_empty() {
            return "list".to_string();
        }
        let parts: Vec<String> = self
            .predicates
            .iter()
            .map(|p| match p {
                Predicate::Equal { field, value } => format!("eq({field},{value})"),
                Predicate::GreaterThan { field, value } => format!("gt({field},{value})"),
                Predicate::GreaterThanOrEqual { field, value } => format!("gte({field},{value})"),
                Predicate::LessThan { field, value } => format!("lt({field},{value})"),
                Predicate::LessThanOrEqual { field, value } => format!("lte({field},{value})"),
                Predicate::OrderAsc(field) => format!("asc({field})"),
                Predicate::OrderDesc(field) => format!("desc({field})"),
                Predicate::Limit(n) => format!("limit({n})"),
                Predicate::Offset(n) => format!("offset({n})"),
            })
            .collect();
        format!("list:{}", parts.join(","))
    }

    /// Evaluates the query over a set of decoded records.
    pub fn apply(&self, records: Vec<Record>) -> RecordPage {
        // 1. Filters, AND-composed.
        let mut items: Vec<Record> = records
            .into_iter()
            .filter(|record| self.matches(record))
            .collect();

        // 2. Total before pagination.
        let total = items.len() as u64;

        // 3. Ordering: apply stable sorts in reverse predicate order so the
        //    first order predicate ends up as the primary sort key.
        let orderings: Vec<&Predicate> = self
            .predicates
            .iter()
            .filter(|p| matches!(p, Predicate::OrderAsc(_) | Predicate::OrderDesc(_)))
            .collect();
        for predicate in orderings.into_iter().rev() {
            match predicate {
                Predicate::OrderAsc(field) => {
                    items.sort_by(|a, b| compare_fields(a, b, field));
                }
                Predicate::OrderDesc(field) => {
                    items.sort_by(|a, b| compare_fields(a, b, field).reverse());
                }
                _ => {}
            }
        }

        // 4. Offset then limit.
        let offset = self
            .predicates
            .iter()
            .find_map(|p| match p {
                Predicate::Offset(n) => Some(*n as usize),
                _ => None,
            })
            .unwrap_or(0);
        let limit = self.predicates.iter().find_map(|p| match p {
            Predicate::Limit(n) => Some(*n as usize),
            _ => None,
        });

        let mut items: Vec<Record> = items.into_iter().skip(offset).collect();
        if let Some(limit) = limit {
            items.truncate(limit);
        }

        RecordPage { items, total }
    }

    fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|predicate| match predicate {
            Predicate::Equal { field, value } => {
                field_value(record, field).as_ref() == Some(value)
            }
            Predicate::GreaterThan { field, value } => {
                compare_with(record, field, value) == Some(Ordering::Greater)
            }
            Predicate::GreaterThanOrEqual { field, value } => matches!(
                compare_with(record, field, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::LessThan { field, value } => {
                compare_with(record, field, value) == Some(Ordering::Less)
            }
            Predicate::LessThanOrEqual { field, value } => matches!(
                compare_with(record, field, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            // Ordering/pagination predicates never exclude a record.
            Predicate::OrderAsc(_)
            | Predicate::OrderDesc(_)
            | Predicate::Limit(_)
            | Predicate::Offset(_) => true,
        })
    }
}

// =============================================================================
// Field Access & Comparison
// =============================================================================

/// Resolves a field, treating id and timestamps as addressable system fields.
fn field_value(record: &Record, field: &str) -> Option<Value> {
    match field {
        "id" => Some(Value::String(record.id.to_string())),
        "created_at" => serde_json::to_value(record.created_at).ok(),
        "updated_at" => serde_json::to_value(record.updated_at).ok(),
        _ => record.fields.get(field).cloned(),
    }
}

fn compare_with(record: &Record, field: &str, value: &Value) -> Option<Ordering> {
    field_value(record, field).and_then(|actual| compare_values(&actual, value))
}

fn compare_fields(a: &Record, b: &Record, field: &str) -> Ordering {
    let left = field_value(a, field);
    let right = field_value(b, field);
    match (left, right) {
        (Some(left), Some(right)) => compare_values(&left, &right).unwrap_or(Ordering::Equal),
        // Records missing the field sort first, deterministically.
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compares two JSON scalars of the same shape; mixed shapes are unordered.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().and_then(|x| y.as_f64().map(|y| (x, y)))
                .and_then(|(x, y)| x.partial_cmp(&y))
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Map};
    use sodi_core::RecordId;

    fn record(id: &str, fields: Value) -> Record {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Record {
            id: RecordId::Permanent(id.to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            fields,
        }
    }

    fn sample_records() -> Vec<Record> {
        vec![
            record("a", json!({"name": "Amulet", "price": 300, "client_id": "c1"})),
            record("b", json!({"name": "Bracelet", "price": 100, "client_id": "c2"})),
            record("c", json!({"name": "Collier", "price": 200, "client_id": "c1"})),
        ]
    }

    #[test]
    fn test_equality_filter() {
        let page = ListQuery::new()
            .equal("client_id", json!("c1"))
            .apply(sample_records());
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn test_range_filters() {
        let page = ListQuery::new()
            .greater_than("price", json!(100))
            .less_than_or_equal("price", json!(300))
            .apply(sample_records());
        assert_eq!(page.total, 2);

        let page = ListQuery::new()
            .greater_than_or_equal("price", json!(100))
            .apply(sample_records());
        assert_eq!(page.total, 3);

        let page = ListQuery::new()
            .less_than("price", json!(100))
            .apply(sample_records());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_ordering() {
        let page = ListQuery::new().order_desc("price").apply(sample_records());
        let prices: Vec<i64> = page
            .items
            .iter()
            .filter_map(|r| r.field("price").and_then(Value::as_i64))
            .collect();
        assert_eq!(prices, vec![300, 200, 100]);
    }

    #[test]
    fn test_pagination_preserves_total() {
        let page = ListQuery::new()
            .order_asc("price")
            .offset(1)
            .limit(1)
            .apply(sample_records());
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].field("price"), Some(&json!(200)));
    }

    #[test]
    fn test_system_field_ordering() {
        let page = ListQuery::new().order_asc("id").apply(sample_records());
        let ids: Vec<String> = page.items.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_field_never_matches_filters() {
        let page = ListQuery::new()
            .equal("category", json!("rings"))
            .apply(sample_records());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_cache_key_is_stable_and_distinct() {
        let a = ListQuery::new().equal("client_id", json!("c1")).limit(10);
        let b = ListQuery::new().equal("client_id", json!("c1")).limit(10);
        let c = ListQuery::new().equal("client_id", json!("c2")).limit(10);

        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
        assert_eq!(ListQuery::new().cache_key(), "list");
    }
}
