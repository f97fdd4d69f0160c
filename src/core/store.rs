//! Store trait for the hosted relational backend
//!
//! The core never talks to a database directly. Every read and write goes
//! through [`Store`], which is keyed by table name and an equality filter.
//! No joins are performed by the store; callers compose several calls when
//! they need related rows.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A single row, represented as a JSON object
pub type Record = Map<String, Value>;

/// Equality filter: every `(column, value)` pair must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: BTreeMap<String, Value>,
}

impl Filter {
    /// An empty filter matching every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(column.into(), value.into());
        self
    }

    /// Check whether a record satisfies every condition
    ///
    /// A missing column only matches a `null` condition.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|(column, expected)| {
            let actual = record.get(column).unwrap_or(&Value::Null);
            actual == expected
        })
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.conditions.iter()
    }
}

/// Sort direction for [`FetchOptions::order_by`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Ordering and paging for [`Store::fetch_all`]
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Apply sorting and paging to an already filtered set of rows
    ///
    /// Sorting is stable, so rows with equal keys keep their storage order.
    pub fn apply(&self, mut rows: Vec<Record>) -> Vec<Record> {
        if let Some((column, direction)) = &self.order_by {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(column).unwrap_or(&Value::Null),
                    b.get(column).unwrap_or(&Value::Null),
                );
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let offset = self.offset.unwrap_or(0);
        let rows = rows.into_iter().skip(offset);
        match self.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }
}

/// Total order over JSON scalars used for sorting
///
/// RFC 3339 timestamps are compared as instants rather than as text, since
/// serialized fractional seconds vary in width.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => {
            match (
                x.parse::<DateTime<Utc>>(),
                y.parse::<DateTime<Utc>>(),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Generic persistence collaborator
///
/// Implementations must be safe to share across concurrently handled
/// requests. Errors are infrastructure failures only: a missing row is
/// `Ok(None)`, never an error.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the first row of `table` matching `filter`
    async fn fetch_one(&self, table: &str, filter: &Filter) -> Result<Option<Record>>;

    /// Fetch every row of `table` matching `filter`
    async fn fetch_all(
        &self,
        table: &str,
        filter: &Filter,
        options: &FetchOptions,
    ) -> Result<Vec<Record>>;

    /// Insert a row and return it as stored
    async fn insert(&self, table: &str, record: Record) -> Result<Record>;

    /// Merge `patch` into the first row matching `filter`
    ///
    /// Returns the updated row, or `None` when nothing matched.
    async fn update(&self, table: &str, filter: &Filter, patch: Record) -> Result<Option<Record>>;

    /// Delete every row matching `filter`
    ///
    /// Returns `true` when at least one row was removed.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<bool>;
}
