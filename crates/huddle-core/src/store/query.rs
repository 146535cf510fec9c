//! Query filters and ordering.
//!
//! Evaluation lives here rather than in each store so that every
//! implementation orders results identically: by the order key, then by
//! document id as the tie-breaker.

use std::cmp::Ordering;

use serde_json::Value;

use super::{DocumentSnapshot, Fields};

/// Field value at a dotted path.
pub fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Total order over JSON values, as the store sorts them.
///
/// Missing and `null` sort first, then booleans, numbers, strings, arrays and
/// objects. Values of the same kind compare naturally; arrays and objects
/// compare equal to each other.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_u64(), y.as_u64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            },
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// A predicate on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Array at `path` contains `value`.
    ArrayContains {
        /// Dotted field path.
        path: String,
        /// Value that must be present.
        value: Value,
    },

    /// Field equals `value`.
    Equal {
        /// Dotted field path.
        path: String,
        /// Expected value.
        value: Value,
    },

    /// Field is present and differs from `value`.
    NotEqual {
        /// Dotted field path.
        path: String,
        /// Excluded value.
        value: Value,
    },
}

impl Filter {
    /// Whether the document passes this filter.
    pub fn matches(&self, doc: &DocumentSnapshot) -> bool {
        match self {
            Self::ArrayContains { path, value } => {
                matches!(doc.get(path), Some(Value::Array(items)) if items.contains(value))
            },
            Self::Equal { path, value } => doc.get(path) == Some(value),
            Self::NotEqual { path, value } => doc.get(path).is_some_and(|v| v != value),
        }
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    /// Store-assigned create time.
    CreateTime,
    /// Value at a dotted field path.
    Field(String),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Query ordering. Ties are broken by document id, in the same direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Sort key.
    pub key: OrderKey,
    /// Sort direction.
    pub direction: Direction,
}

impl Default for OrderBy {
    fn default() -> Self {
        Self { key: OrderKey::CreateTime, direction: Direction::Ascending }
    }
}

/// Filtered, ordered selection over one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// All filters must match.
    pub filters: Vec<Filter>,
    /// Result ordering.
    pub order: OrderBy,
}

impl Query {
    /// Every document, oldest first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Replace the ordering.
    #[must_use]
    pub fn order_by(mut self, key: OrderKey, direction: Direction) -> Self {
        self.order = OrderBy { key, direction };
        self
    }

    /// Filter and sort `docs`.
    pub fn evaluate<'a>(
        &self,
        docs: impl IntoIterator<Item = &'a DocumentSnapshot>,
    ) -> Vec<DocumentSnapshot> {
        let mut results: Vec<DocumentSnapshot> = docs
            .into_iter()
            .filter(|doc| self.filters.iter().all(|filter| filter.matches(doc)))
            .cloned()
            .collect();

        results.sort_by(|a, b| {
            let ordering = match &self.order.key {
                OrderKey::CreateTime => a.create_time.cmp(&b.create_time),
                OrderKey::Field(path) => compare_values(a.get(path), b.get(path)),
            }
            .then_with(|| a.id.cmp(&b.id));

            match self.order.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });

        results
    }
}
