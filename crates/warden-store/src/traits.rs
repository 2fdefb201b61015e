use async_trait::async_trait;
use serde_json::Value;
use warden_types::{BreachRecord, ResultSet};

use crate::StoreResult;

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    /// Maximum records to return; 0 means unbounded.
    pub limit: usize,
    pub offset: usize,
}

/// Read access to the relational dataset under evaluation.
///
/// Implementations execute exactly the statement they are given with the
/// supplied positional bindings and return the rows. They make no judgment
/// about containment; that boundary belongs to the engine.
#[async_trait]
pub trait DatasetExecutor: Send + Sync {
    /// Run one read statement with positional parameter bindings.
    async fn execute(&self, sql: &str, params: &[Value]) -> StoreResult<ResultSet>;
}

/// Append-only persistence for non-safe evaluation outcomes.
///
/// No update or delete operations exist; retention is an external concern.
#[async_trait]
pub trait BreachStore: Send + Sync {
    /// Append one audit record.
    async fn record(&self, record: BreachRecord) -> StoreResult<()>;

    /// Read records newest-first.
    async fn list(&self, window: QueryWindow) -> StoreResult<Vec<BreachRecord>>;
}
