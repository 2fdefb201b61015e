//! SQLite adapter for dataset reads and breach auditing.
//!
//! One pool serves both roles the original deployment co-located in a single
//! database file: executing read statements against the operator's dataset
//! and appending to the breach audit table. Connections are acquired per
//! statement and released on every exit path by the pool.

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use warden_types::{BreachRecord, ResultSet};

use crate::traits::{BreachStore, DatasetExecutor, QueryWindow};
use crate::{StoreError, StoreResult};

/// SQLite-backed dataset access and audit persistence.
#[derive(Clone)]
pub struct SqliteDataset {
    pool: SqlitePool,
}

impl SqliteDataset {
    /// Connect and initialize the audit schema.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        Self::connect_with_options(database_url, 5, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        acquire_timeout_secs: u64,
    ) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(acquire_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect sqlite: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an adapter from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS breach_log (
                record_id TEXT PRIMARY KEY,
                authorized_id TEXT NOT NULL,
                user_sql TEXT NOT NULL,
                reason TEXT NOT NULL,
                is_superset INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                metadata TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("schema init failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl DatasetExecutor for SqliteDataset {
    async fn execute(&self, sql: &str, params: &[Value]) -> StoreResult<ResultSet> {
        let mut query = sqlx::query(sql);
        for value in params {
            query = bind_value(query, value)?;
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Execution(e.to_string()))?;
        rows_to_result_set(&rows)
    }
}

#[async_trait]
impl BreachStore for SqliteDataset {
    async fn record(&self, record: BreachRecord) -> StoreResult<()> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO breach_log
                (record_id, authorized_id, user_sql, reason, is_superset, created_at, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.record_id)
        .bind(&record.authorized_id)
        .bind(&record.user_sql)
        .bind(&record.reason)
        .bind(i64::from(record.is_superset))
        .bind(record.created_at.timestamp())
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("audit append failed: {e}")))?;
        Ok(())
    }

    async fn list(&self, window: QueryWindow) -> StoreResult<Vec<BreachRecord>> {
        let limit = if window.limit == 0 {
            -1
        } else {
            window.limit as i64
        };
        let rows = sqlx::query(
            r#"
            SELECT record_id, authorized_id, user_sql, reason, is_superset, created_at, metadata
            FROM breach_log
            ORDER BY created_at DESC, record_id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(window.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("audit read failed: {e}")))?;

        rows.iter().map(row_to_breach_record).collect()
    }
}

fn row_to_breach_record(row: &SqliteRow) -> StoreResult<BreachRecord> {
    let created_secs: i64 = row
        .try_get("created_at")
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    let created_at = DateTime::from_timestamp(created_secs, 0)
        .ok_or_else(|| StoreError::Serialization(format!("bad timestamp: {created_secs}")))?;
    let metadata: String = row
        .try_get("metadata")
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    let metadata =
        serde_json::from_str(&metadata).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let is_superset: i64 = row
        .try_get("is_superset")
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(BreachRecord {
        record_id: try_get_text(row, "record_id")?,
        authorized_id: try_get_text(row, "authorized_id")?,
        user_sql: try_get_text(row, "user_sql")?,
        reason: try_get_text(row, "reason")?,
        is_superset: is_superset != 0,
        created_at,
        metadata,
    })
}

fn try_get_text(row: &SqliteRow, column: &str) -> StoreResult<String> {
    row.try_get(column)
        .map_err(|e| StoreError::Backend(e.to_string()))
}

/// Bind one JSON value positionally.
///
/// Structured values (arrays, objects) bind as their JSON text; the dataset
/// schema has no structured column types to receive them natively.
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> StoreResult<Query<'q, Sqlite, SqliteArguments<'q>>> {
    Ok(match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(flag) => query.bind(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                query.bind(int)
            } else if let Some(float) = number.as_f64() {
                query.bind(float)
            } else {
                return Err(StoreError::Serialization(format!(
                    "parameter value out of range: {number}"
                )));
            }
        }
        Value::String(text) => query.bind(text.as_str()),
        other => query.bind(other.to_string()),
    })
}

fn rows_to_result_set(rows: &[SqliteRow]) -> StoreResult<ResultSet> {
    let columns: Vec<String> = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut tuple = Vec::with_capacity(row.columns().len());
        for idx in 0..row.columns().len() {
            tuple.push(decode_value(row, idx)?);
        }
        tuples.push(tuple);
    }
    Ok(ResultSet::new(columns, tuples))
}

/// Decode one cell to JSON by the engine's declared storage class.
fn decode_value(row: &SqliteRow, idx: usize) -> StoreResult<Value> {
    let (is_null, type_name) = {
        let raw = row
            .try_get_raw(idx)
            .map_err(|e| StoreError::Execution(e.to_string()))?;
        (raw.is_null(), raw.type_info().name().to_uppercase())
    };
    if is_null {
        return Ok(Value::Null);
    }

    let decoded = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(idx).map(Value::from),
        "REAL" => row.try_get::<f64, _>(idx).map(|float| {
            serde_json::Number::from_f64(float)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }),
        "BLOB" => row.try_get::<Vec<u8>, _>(idx).map(|bytes| {
            Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect())
        }),
        _ => row.try_get::<String, _>(idx).map(Value::String),
    };
    decoded.map_err(|e| StoreError::Execution(e.to_string()))
}
