//! In-memory implementation of Store for testing and development

use crate::core::store::{FetchOptions, Filter, Record, Store};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

type Table = IndexMap<String, Record>;

/// In-memory store implementation
///
/// Tables are created on first insert. Rows keep insertion order and are
/// keyed by their `id` column, which is generated when absent.
/// Uses RwLock for thread-safe access.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl InMemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held in `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .map(|tables| tables.get(table).map_or(0, IndexMap::len))
            .unwrap_or(0)
    }
}

fn row_key(record: &Record) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn fetch_one(&self, table: &str, filter: &Filter) -> Result<Option<Record>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(tables
            .get(table)
            .and_then(|rows| rows.values().find(|row| filter.matches(row)))
            .cloned())
    }

    async fn fetch_all(
        &self,
        table: &str,
        filter: &Filter,
        options: &FetchOptions,
    ) -> Result<Vec<Record>> {
        let matching: Vec<Record> = {
            let tables = self
                .tables
                .read()
                .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

            tables
                .get(table)
                .map(|rows| {
                    rows.values()
                        .filter(|row| filter.matches(row))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(options.apply(matching))
    }

    async fn insert(&self, table: &str, mut record: Record) -> Result<Record> {
        let key = match row_key(&record) {
            Some(key) => key,
            None => {
                let id = Uuid::new_v4().to_string();
                record.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(&key) {
            return Err(anyhow!("Duplicate key '{}' in table '{}'", key, table));
        }
        rows.insert(key, record.clone());

        Ok(record)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Record) -> Result<Option<Record>> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(rows) = tables.get_mut(table) else {
            return Ok(None);
        };

        let Some(row) = rows.values_mut().find(|row| filter.matches(row)) else {
            return Ok(None);
        };

        for (column, value) in patch {
            if column == "id" {
                continue;
            }
            row.insert(column, value);
        }

        Ok(Some(row.clone()))
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<bool> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(rows) = tables.get_mut(table) else {
            return Ok(false);
        };

        let before = rows.len();
        rows.retain(|_, row| !filter.matches(row));

        Ok(rows.len() < before)
    }
}
