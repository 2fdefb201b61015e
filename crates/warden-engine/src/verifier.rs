//! Dynamic verification: execute both statements and hand the results back.
//!
//! The verifier answers "what did each query actually return", not "what
//! does that mean" — subset interpretation belongs to the gate. Dataset
//! access comes in as an injected capability so tests can run against a
//! scripted executor or an in-memory database.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use warden_store::DatasetExecutor;
use warden_types::{AuthorizedQuery, ParamMap, ResultSet};

use crate::error::EngineError;

/// Both executed result sets from one evaluation.
#[derive(Debug, Clone)]
pub struct VerifiedPair {
    pub authorized: ResultSet,
    pub user: ResultSet,
}

/// Executes the authorized template and the submitted statement against the
/// live dataset.
pub struct DynamicVerifier {
    executor: Arc<dyn DatasetExecutor>,
}

impl DynamicVerifier {
    pub fn new(executor: Arc<dyn DatasetExecutor>) -> Self {
        Self { executor }
    }

    /// Run both statements; any engine rejection surfaces as an execution
    /// error with the offending side named.
    pub async fn verify(
        &self,
        authorized: &AuthorizedQuery,
        params: &ParamMap,
        user_sql: &str,
    ) -> Result<VerifiedPair, EngineError> {
        let (bound_sql, bindings) = bind_template(&authorized.sql, &authorized.params, params);
        debug!(authorized_id = %authorized.id, bindings = bindings.len(), "executing authorized query");
        let authorized_rows = self
            .executor
            .execute(&bound_sql, &bindings)
            .await
            .map_err(|e| EngineError::Execution(format!("authorized query execution error: {e}")))?;

        // The lexical gatekeeper already ran; this minimal re-check guards
        // the execution path on its own.
        runtime_guard(user_sql).map_err(EngineError::Execution)?;
        debug!("executing submitted query");
        let user_rows = self
            .executor
            .execute(user_sql, &[])
            .await
            .map_err(|e| EngineError::Execution(format!("user query execution error: {e}")))?;

        Ok(VerifiedPair {
            authorized: authorized_rows,
            user: user_rows,
        })
    }
}

/// Rewrite `:name` placeholders to positional markers in declaration order,
/// collecting the values to bind. A declared name missing from the caller's
/// bindings binds SQL NULL. Each placeholder is expected to appear at most
/// once in the template.
pub fn bind_template(sql: &str, declared: &[String], bound: &ParamMap) -> (String, Vec<Value>) {
    let mut rewritten = sql.to_string();
    let mut values = Vec::new();
    for name in declared {
        let placeholder = format!(":{name}");
        if rewritten.contains(&placeholder) {
            rewritten = rewritten.replace(&placeholder, "?");
            values.push(bound.get(name).cloned().unwrap_or(Value::Null));
        }
    }
    (rewritten, values)
}

/// Minimal runtime guard applied immediately before execution.
fn runtime_guard(sql: &str) -> Result<(), String> {
    let trimmed = sql.trim();
    if !trimmed.to_lowercase().starts_with("select") {
        return Err("user query execution error: only SELECT statements are allowed".to_string());
    }
    if trimmed.get(1..).is_some_and(|rest| rest.contains(';')) {
        return Err(
            "user query execution error: multiple statements are not allowed".to_string(),
        );
    }
    Ok(())
}
