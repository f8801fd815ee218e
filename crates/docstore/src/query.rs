use std::cmp::Ordering;

use serde_json::Value;

use crate::document::Document;

/// A single query predicate on a top-level field.
///
/// A document missing the field never matches.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq(String, Value),
    /// `value` is an element of the array in `field`.
    ArrayContains(String, Value),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Filter {
        return Filter::Eq(field.to_string(), value.into());
    }

    pub fn array_contains(field: &str, value: impl Into<Value>) -> Filter {
        return Filter::ArrayContains(field.to_string(), value.into());
    }

    /// Check whether a document satisfies this predicate.
    pub fn matches(&self, doc: &Document) -> bool {
        return match self {
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::ArrayContains(field, value) => match doc.get(field) {
                Some(Value::Array(values)) => values.contains(value),
                _ => false,
            },
        };
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Filters, an optional sort key and an optional limit.
///
/// Sorting on a field excludes documents that lack it, matching the
/// behavior of the hosted database.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Query {
        return Query::default();
    }

    pub fn filter(mut self, filter: Filter) -> Query {
        self.filters.push(filter);
        return self;
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Query {
        self.order_by = Some(OrderBy { field: field.to_string(), direction });
        return self;
    }

    pub fn limit(mut self, limit: usize) -> Query {
        self.limit = Some(limit);
        return self;
    }

    /// Apply this query to a set of candidate documents.
    pub fn run(&self, candidates: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut found: Vec<Document> = candidates
            .into_iter()
            .filter(|doc| self.filters.iter().all(|f| f.matches(doc)))
            .collect();

        if let Some(order) = &self.order_by {
            found.retain(|doc| doc.get(&order.field).is_some_and(|v| !v.is_null()));
            // Stable sort keeps id order among equal keys.
            found.sort_by(|a, b| {
                let ordering = match (a.get(&order.field), b.get(&order.field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                return match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                };
            });
        }

        if let Some(limit) = self.limit {
            found.truncate(limit);
        }
        return found;
    }
}

/// Compare two JSON values of the same scalar type.
/// Returns `None` for mismatched or non-scalar types.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    return match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    };
}
