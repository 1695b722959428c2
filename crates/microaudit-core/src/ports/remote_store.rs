//! Remote store port (driven/secondary port)
//!
//! This module defines the interface for reading and writing rows in the
//! remote relational backend. Rows are flat JSON objects (see
//! [`crate::domain::record`] for the column conventions); the store assigns
//! primary keys on create.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   (HTTP status codes, connection failures, injected test failures).
//! - Uses `#[async_trait]` for async trait methods.
//! - [`Query`] covers what the sync model needs: equality filters, one
//!   ordering column and a row limit.

use std::cmp::Ordering;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::newtypes::{OwnerId, RecordId};
use crate::domain::record::{Fields, Table, OWNER_FIELD, UPDATED_AT_FIELD};

// ============================================================================
// Query
// ============================================================================

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Query-string form (`asc` / `desc`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// Ordering of a query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Column to sort on
    pub column: String,
    /// Sort direction
    pub direction: Direction,
}

/// Row selection for [`IRemoteStore::query`]
///
/// Filters are combined with AND logic.
///
/// # Example
///
/// ```
/// use microaudit_core::ports::{Direction, Query};
///
/// let query = Query::new()
///     .eq("user_id", "u1")
///     .order_by("updated_at", Direction::Desc)
///     .limit(50);
/// assert_eq!(query.filters().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    filters: Vec<(String, String)>,
    order: Option<OrderBy>,
    limit: Option<usize>,
}

impl Query {
    /// Creates a query selecting every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows owned by `owner`, newest first, at most `limit` rows
    pub fn owned_by(owner: &OwnerId, limit: usize) -> Self {
        Self::new()
            .eq(OWNER_FIELD, owner.as_str())
            .order_by(UPDATED_AT_FIELD, Direction::Desc)
            .limit(limit)
    }

    /// Adds an equality filter
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    /// Sets the ordering
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    /// Sets the row limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Equality filters as `(column, value)` pairs
    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    /// Ordering, if any
    pub fn order(&self) -> Option<&OrderBy> {
        self.order.as_ref()
    }

    /// Row limit, if any
    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns true if `row` passes every filter
    ///
    /// Values are compared in their string form, so a filter `"7"` matches
    /// both the string `"7"` and the number `7`.
    pub fn matches(&self, row: &Fields) -> bool {
        self.filters.iter().all(|(column, expected)| {
            row.get(column)
                .map(|v| value_to_filter_string(v) == *expected)
                .unwrap_or(false)
        })
    }

    /// Filters, sorts and truncates `rows` the way a store would
    pub fn apply(&self, rows: impl IntoIterator<Item = Fields>) -> Vec<Fields> {
        let mut selected: Vec<Fields> = rows.into_iter().filter(|r| self.matches(r)).collect();
        if let Some(order) = &self.order {
            selected.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

fn value_to_filter_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => value_to_filter_string(x).cmp(&value_to_filter_string(y)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the remote relational store
///
/// ## Implementation Notes
///
/// - `create` returns the stored row, including the assigned `id`.
/// - `update` writes only the given fields and returns the stored row.
/// - `delete` succeeds silently when the row is already gone.
/// - Implementations must be `Send + Sync` so they can be shared across
///   the tasks spawned by the save scheduler.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Inserts a row and returns it as stored
    async fn create(&self, table: Table, fields: Fields) -> anyhow::Result<Fields>;

    /// Updates the row with the given identifier and returns it as stored
    async fn update(&self, table: Table, id: &RecordId, fields: Fields) -> anyhow::Result<Fields>;

    /// Deletes the row with the given identifier
    async fn delete(&self, table: Table, id: &RecordId) -> anyhow::Result<()>;

    /// Returns the rows selected by `query`
    async fn query(&self, table: Table, query: &Query) -> anyhow::Result<Vec<Fields>>;
}
