//! Deterministic in-memory adapters for engine tests.
//!
//! [`ScriptedExecutor`] answers statements from a prepared script instead of
//! a database; [`MemoryBreachLog`] keeps audit records in a vector. Both are
//! safe under concurrent evaluations, matching the contracts the SQLite
//! adapter honors.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use warden_types::{BreachRecord, ResultSet};

use crate::traits::{BreachStore, DatasetExecutor, QueryWindow};
use crate::{StoreError, StoreResult};

/// Collapse whitespace and case so scripted lookups tolerate formatting.
fn normalize_statement(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Dataset executor answering from a prepared statement -> rows script.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: RwLock<HashMap<String, ResultSet>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the result returned for a statement (whitespace/case relaxed).
    pub fn script(&self, sql: &str, result: ResultSet) {
        if let Ok(mut guard) = self.responses.write() {
            guard.insert(normalize_statement(sql), result);
        }
    }
}

#[async_trait]
impl DatasetExecutor for ScriptedExecutor {
    async fn execute(&self, sql: &str, _params: &[Value]) -> StoreResult<ResultSet> {
        let guard = self
            .responses
            .read()
            .map_err(|_| StoreError::Backend("script lock poisoned".to_string()))?;
        guard
            .get(&normalize_statement(sql))
            .cloned()
            .ok_or_else(|| StoreError::Execution(format!("no such table or statement: {sql}")))
    }
}

/// Append-only in-memory breach log.
#[derive(Default)]
pub struct MemoryBreachLog {
    records: RwLock<Vec<BreachRecord>>,
}

impl MemoryBreachLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BreachStore for MemoryBreachLog {
    async fn record(&self, record: BreachRecord) -> StoreResult<()> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::Backend("breach log lock poisoned".to_string()))?;
        guard.push(record);
        Ok(())
    }

    async fn list(&self, window: QueryWindow) -> StoreResult<Vec<BreachRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("breach log lock poisoned".to_string()))?;
        let mut values = guard.clone();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let iter = values.into_iter().skip(window.offset);
        Ok(if window.limit == 0 {
            iter.collect()
        } else {
            iter.take(window.limit).collect()
        })
    }
}
