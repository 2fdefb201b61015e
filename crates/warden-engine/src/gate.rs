//! The containment gate: one evaluation from raw submission to Decision.
//!
//! The gate runs the layered pipeline in order — lexical/static analysis,
//! dynamic execution, subset comparison, advisory consultation — and is the
//! only place the layers' outcomes are merged. Every non-safe outcome is
//! recorded in the breach store; persistence failures are reported but never
//! change the Decision handed back to the caller.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};
use warden_oracle::{ContainmentOracle, OracleHint};
use warden_registry::AuthorizedQueryProvider;
use warden_store::{BreachStore, DatasetExecutor};
use warden_types::{AuthorizedQuery, BreachRecord, Decision, SubmittedRequest};

use crate::containment;
use crate::error::EngineError;
use crate::verifier::DynamicVerifier;

/// Operator policy knobs for the gate.
#[derive(Clone, Debug)]
pub struct GateConfig {
    /// Persist audit records for rejections too, not only true breaches.
    /// Unknown-id policy errors are never audited either way.
    pub audit_rejections: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            audit_rejections: true,
        }
    }
}

/// The containment decision engine's entry point.
pub struct ContainmentGate {
    registry: Arc<dyn AuthorizedQueryProvider>,
    verifier: DynamicVerifier,
    oracle: Arc<dyn ContainmentOracle>,
    audit: Arc<dyn BreachStore>,
    config: GateConfig,
}

impl ContainmentGate {
    pub fn new(
        registry: Arc<dyn AuthorizedQueryProvider>,
        executor: Arc<dyn DatasetExecutor>,
        oracle: Arc<dyn ContainmentOracle>,
        audit: Arc<dyn BreachStore>,
        config: GateConfig,
    ) -> Self {
        Self {
            registry,
            verifier: DynamicVerifier::new(executor),
            oracle,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Evaluate one submission into a terminal [`Decision`].
    ///
    /// The only error that escapes is the client-caused unknown-id lookup;
    /// every other failure is folded into the Decision.
    pub async fn evaluate(&self, request: SubmittedRequest) -> Result<Decision, EngineError> {
        info!(authorized_id = %request.authorized_id, "submission received");

        let authorized = self
            .registry
            .lookup(&request.authorized_id)
            .ok_or_else(|| EngineError::UnknownAuthorizedQuery(request.authorized_id.clone()))?;

        // Static stage: lexical gatekeeper + structural containment.
        let verdict = containment::analyze(
            &request.sql,
            &authorized.sql,
            &authorized.allowed_tables,
            &authorized.allowed_columns,
        );
        if !verdict.passed {
            let reason = verdict.reason_trail();
            warn!(
                authorized_id = %request.authorized_id,
                reason = %reason,
                "static containment rejected submission"
            );
            if self.config.audit_rejections {
                self.audit_best_effort(self.rejection_record(&request, &reason))
                    .await;
            }
            return Ok(Decision::Rejected { reason });
        }
        debug!("static containment checks passed");

        // Dynamic stage: run both statements.
        let pair = match self
            .verifier
            .verify(&authorized, &request.params, &request.sql)
            .await
        {
            Ok(pair) => pair,
            Err(EngineError::Execution(reason)) => {
                warn!(
                    authorized_id = %request.authorized_id,
                    reason = %reason,
                    "execution failed during dynamic verification"
                );
                if self.config.audit_rejections {
                    self.audit_best_effort(self.rejection_record(&request, &reason))
                        .await;
                }
                return Ok(Decision::Rejected { reason });
            }
            Err(other) => return Err(other),
        };

        let user_rows = pair.user.to_objects();
        let authorized_rows = pair.authorized.to_objects();

        // Subset comparison over canonical row tuples.
        if !pair.user.is_subset_of(&pair.authorized) {
            let reason = "user results are not a subset of authorized results".to_string();
            warn!(
                authorized_id = %request.authorized_id,
                user_rows = pair.user.len(),
                authorized_rows = pair.authorized.len(),
                "containment breach detected"
            );
            self.audit_best_effort(self.breach_record(&request, &authorized, &reason))
                .await;
            return Ok(Decision::Breach {
                reason,
                user_rows,
                authorized_rows,
            });
        }

        // Provisional safe: the advisory oracle may still narrow it.
        match self.oracle.hint(&request.sql, &authorized.sql).await {
            OracleHint::Vetoes => {
                let reason =
                    "advisory oracle vetoed containment after subset checks passed".to_string();
                warn!(authorized_id = %request.authorized_id, "advisory oracle veto");
                self.audit_best_effort(self.breach_record(&request, &authorized, &reason))
                    .await;
                Ok(Decision::Breach {
                    reason,
                    user_rows,
                    authorized_rows,
                })
            }
            hint @ (OracleHint::Confirms | OracleHint::Unknown) => {
                info!(
                    authorized_id = %request.authorized_id,
                    oracle = ?hint,
                    "submission contained; safe"
                );
                Ok(Decision::Safe {
                    reason: "user results are a subset (or equal) of authorized results"
                        .to_string(),
                    user_rows,
                    authorized_rows,
                })
            }
        }
    }

    fn rejection_record(&self, request: &SubmittedRequest, reason: &str) -> BreachRecord {
        BreachRecord::new(
            &request.authorized_id,
            &request.sql,
            reason,
            false,
            json!({ "params": request.params }),
        )
    }

    fn breach_record(
        &self,
        request: &SubmittedRequest,
        authorized: &AuthorizedQuery,
        reason: &str,
    ) -> BreachRecord {
        BreachRecord::new(
            &request.authorized_id,
            &request.sql,
            reason,
            true,
            json!({
                "params": request.params,
                "authorized_sql": authorized.sql,
            }),
        )
    }

    async fn audit_best_effort(&self, record: BreachRecord) {
        if let Err(err) = self.audit.record(record).await {
            warn!(error = %err, "failed to persist audit record; decision unaffected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::FailingBreachStore;
    use serde_json::json;
    use warden_oracle::{DisabledOracle, FixedOracle};
    use warden_registry::QueryRegistry;
    use warden_store::{MemoryBreachLog, QueryWindow, ScriptedExecutor, SqliteDataset};
    use warden_types::{ParamMap, ResultSet};

    fn sample_registry() -> QueryRegistry {
        QueryRegistry::from_json(
            r#"[{
                "id": "user_by_id",
                "sql": "SELECT id, username FROM Users WHERE id = :uid",
                "params": ["uid"],
                "allowed_tables": ["users"],
                "allowed_columns": ["id", "username"]
            }]"#,
        )
        .unwrap()
    }

    fn sample_request(sql: &str) -> SubmittedRequest {
        let mut params = ParamMap::new();
        params.insert("uid".into(), json!(1));
        SubmittedRequest {
            authorized_id: "user_by_id".into(),
            sql: sql.into(),
            params,
        }
    }

    fn alice_row() -> ResultSet {
        ResultSet::new(
            vec!["id".into(), "username".into()],
            vec![vec![json!(1), json!("alice")]],
        )
    }

    fn alice_and_bob_rows() -> ResultSet {
        ResultSet::new(
            vec!["id".into(), "username".into()],
            vec![
                vec![json!(1), json!("alice")],
                vec![json!(2), json!("bob")],
            ],
        )
    }

    struct Harness {
        gate: ContainmentGate,
        executor: Arc<ScriptedExecutor>,
        audit: Arc<MemoryBreachLog>,
    }

    fn harness_with(oracle: Arc<dyn ContainmentOracle>, config: GateConfig) -> Harness {
        let executor = Arc::new(ScriptedExecutor::new());
        let audit = Arc::new(MemoryBreachLog::new());
        let gate = ContainmentGate::new(
            Arc::new(sample_registry()),
            executor.clone(),
            oracle,
            audit.clone(),
            config,
        );
        Harness {
            gate,
            executor,
            audit,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(DisabledOracle), GateConfig::default())
    }

    #[tokio::test]
    async fn scenario_a_matching_filter_is_safe() {
        let h = harness();
        h.executor
            .script("SELECT id, username FROM Users WHERE id = ?", alice_row());
        h.executor
            .script("SELECT id, username FROM Users WHERE id = 1", alice_row());

        let decision = h
            .gate
            .evaluate(sample_request("SELECT id, username FROM Users WHERE id = 1"))
            .await
            .unwrap();

        assert!(decision.is_safe());
        if let Decision::Safe { user_rows, .. } = &decision {
            assert_eq!(user_rows[0]["username"], json!("alice"));
        }
        assert!(h.audit.is_empty());
    }

    #[tokio::test]
    async fn scenario_b_wildcard_is_rejected_statically() {
        let h = harness();
        let decision = h
            .gate
            .evaluate(sample_request("SELECT * FROM Users"))
            .await
            .unwrap();

        match &decision {
            Decision::Rejected { reason } => assert!(reason.contains("'*'")),
            other => panic!("expected rejection, got {other:?}"),
        }
        // Rejections are audited by default, but never as supersets.
        let records = h.audit.list(QueryWindow::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_superset);
    }

    #[tokio::test]
    async fn scenario_c_extra_column_is_rejected_statically() {
        let h = harness();
        let decision = h
            .gate
            .evaluate(sample_request(
                "SELECT id, username, email FROM Users WHERE id = 1",
            ))
            .await
            .unwrap();
        match decision {
            Decision::Rejected { reason } => {
                assert!(reason.contains("subset of authorized columns"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scenario_d_result_superset_is_a_breach() {
        let h = harness();
        h.executor
            .script("SELECT id, username FROM Users WHERE id = ?", alice_row());
        h.executor.script(
            "SELECT id, username FROM Users WHERE id = 1 OR id = 2",
            alice_and_bob_rows(),
        );

        let decision = h
            .gate
            .evaluate(sample_request(
                "SELECT id, username FROM Users WHERE id = 1 OR id = 2",
            ))
            .await
            .unwrap();

        match &decision {
            Decision::Breach {
                reason,
                user_rows,
                authorized_rows,
            } => {
                assert!(reason.contains("not a subset"));
                assert_eq!(user_rows.len(), 2);
                assert_eq!(authorized_rows.len(), 1);
            }
            other => panic!("expected breach, got {other:?}"),
        }

        let records = h.audit.list(QueryWindow::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_superset);
        assert_eq!(
            records[0].metadata["authorized_sql"],
            json!("SELECT id, username FROM Users WHERE id = :uid")
        );
    }

    #[tokio::test]
    async fn scenario_e_unknown_id_is_a_policy_error() {
        let h = harness();
        let mut request = sample_request("SELECT id, username FROM Users WHERE id = 1");
        request.authorized_id = "no_such_query".into();

        let err = h.gate.evaluate(request).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownAuthorizedQuery(id) if id == "no_such_query"));
        // Nothing executed, nothing audited.
        assert!(h.audit.is_empty());
    }

    #[tokio::test]
    async fn execution_error_is_rejected_with_reason() {
        let h = harness();
        h.executor
            .script("SELECT id, username FROM Users WHERE id = ?", alice_row());
        // Submitted statement passes static checks but is not scripted, so
        // execution fails like an engine rejection would.
        let decision = h
            .gate
            .evaluate(sample_request("SELECT id FROM Users WHERE id = 1"))
            .await
            .unwrap();

        match decision {
            Decision::Rejected { reason } => {
                assert!(reason.contains("user query execution error"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        let records = h.audit.list(QueryWindow::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_superset);
    }

    #[tokio::test]
    async fn oracle_veto_downgrades_provisional_safe() {
        let h = harness_with(Arc::new(FixedOracle::veto_all()), GateConfig::default());
        h.executor
            .script("SELECT id, username FROM Users WHERE id = ?", alice_row());
        h.executor
            .script("SELECT id, username FROM Users WHERE id = 1", alice_row());

        let decision = h
            .gate
            .evaluate(sample_request("SELECT id, username FROM Users WHERE id = 1"))
            .await
            .unwrap();

        match &decision {
            Decision::Breach { reason, .. } => assert!(reason.contains("advisory oracle")),
            other => panic!("expected breach, got {other:?}"),
        }
        let records = h.audit.list(QueryWindow::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_superset);
    }

    #[tokio::test]
    async fn oracle_confirmation_keeps_safe() {
        let h = harness_with(Arc::new(FixedOracle::confirm_all()), GateConfig::default());
        h.executor
            .script("SELECT id, username FROM Users WHERE id = ?", alice_row());
        h.executor
            .script("SELECT id, username FROM Users WHERE id = 1", alice_row());

        let decision = h
            .gate
            .evaluate(sample_request("SELECT id, username FROM Users WHERE id = 1"))
            .await
            .unwrap();
        assert!(decision.is_safe());
        assert!(h.audit.is_empty());
    }

    #[tokio::test]
    async fn oracle_cannot_promote_a_breach() {
        // Confirms from the oracle must not override a failed subset check.
        let h = harness_with(Arc::new(FixedOracle::confirm_all()), GateConfig::default());
        h.executor
            .script("SELECT id, username FROM Users WHERE id = ?", alice_row());
        h.executor.script(
            "SELECT id, username FROM Users WHERE id = 1 OR id = 2",
            alice_and_bob_rows(),
        );

        let decision = h
            .gate
            .evaluate(sample_request(
                "SELECT id, username FROM Users WHERE id = 1 OR id = 2",
            ))
            .await
            .unwrap();
        assert!(matches!(decision, Decision::Breach { .. }));
    }

    #[tokio::test]
    async fn rejection_audit_can_be_disabled() {
        let h = harness_with(
            Arc::new(DisabledOracle),
            GateConfig {
                audit_rejections: false,
            },
        );
        let decision = h
            .gate
            .evaluate(sample_request("SELECT * FROM Users"))
            .await
            .unwrap();
        assert!(matches!(decision, Decision::Rejected { .. }));
        assert!(h.audit.is_empty());
    }

    #[tokio::test]
    async fn audit_failure_does_not_change_the_decision() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.script("SELECT id, username FROM Users WHERE id = ?", alice_row());
        executor.script(
            "SELECT id, username FROM Users WHERE id = 1 OR id = 2",
            alice_and_bob_rows(),
        );
        let gate = ContainmentGate::new(
            Arc::new(sample_registry()),
            executor,
            Arc::new(DisabledOracle),
            Arc::new(FailingBreachStore),
            GateConfig::default(),
        );

        let decision = gate
            .evaluate(sample_request(
                "SELECT id, username FROM Users WHERE id = 1 OR id = 2",
            ))
            .await
            .unwrap();
        assert!(matches!(decision, Decision::Breach { .. }));
    }

    #[tokio::test]
    async fn resubmission_is_idempotent_but_relogs() {
        let h = harness();
        h.executor
            .script("SELECT id, username FROM Users WHERE id = ?", alice_row());
        h.executor.script(
            "SELECT id, username FROM Users WHERE id = 1 OR id = 2",
            alice_and_bob_rows(),
        );

        let request = sample_request("SELECT id, username FROM Users WHERE id = 1 OR id = 2");
        let first = h.gate.evaluate(request.clone()).await.unwrap();
        let second = h.gate.evaluate(request).await.unwrap();

        assert_eq!(first.reason(), second.reason());
        assert_eq!(first.outcome_label(), second.outcome_label());
        assert_eq!(h.audit.len(), 2);
    }

    #[tokio::test]
    async fn empty_results_on_both_sides_are_safe() {
        let h = harness();
        h.executor.script(
            "SELECT id, username FROM Users WHERE id = ?",
            ResultSet::default(),
        );
        h.executor.script(
            "SELECT id, username FROM Users WHERE id = 1",
            ResultSet::default(),
        );

        let decision = h
            .gate
            .evaluate(sample_request("SELECT id, username FROM Users WHERE id = 1"))
            .await
            .unwrap();
        assert!(decision.is_safe());
    }

    async fn seeded_sqlite() -> Arc<SqliteDataset> {
        let store = SqliteDataset::connect_with_options("sqlite::memory:", 1, 5)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE Users (id INTEGER PRIMARY KEY, username TEXT NOT NULL, email TEXT NOT NULL)")
            .execute(store.pool())
            .await
            .unwrap();
        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            sqlx::query("INSERT INTO Users (id, username, email) VALUES (?, ?, ?)")
                .bind(id)
                .bind(name)
                .bind(format!("{name}@example.com"))
                .execute(store.pool())
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    fn sqlite_gate(store: &Arc<SqliteDataset>) -> ContainmentGate {
        ContainmentGate::new(
            Arc::new(sample_registry()),
            store.clone(),
            Arc::new(DisabledOracle),
            store.clone(),
            GateConfig::default(),
        )
    }

    #[tokio::test]
    async fn live_dataset_subset_is_safe() {
        let store = seeded_sqlite().await;
        let gate = sqlite_gate(&store);

        let decision = gate
            .evaluate(sample_request("SELECT id, username FROM Users WHERE id = 1"))
            .await
            .unwrap();

        assert!(decision.is_safe(), "got: {decision:?}");
        if let Decision::Safe {
            user_rows,
            authorized_rows,
            ..
        } = &decision
        {
            assert_eq!(user_rows, authorized_rows);
            assert_eq!(user_rows[0]["username"], json!("alice"));
        }
    }

    #[tokio::test]
    async fn live_dataset_superset_is_a_breach_and_persisted() {
        let store = seeded_sqlite().await;
        let gate = sqlite_gate(&store);

        let decision = gate
            .evaluate(sample_request(
                "SELECT id, username FROM Users WHERE id = 1 OR id = 2",
            ))
            .await
            .unwrap();

        match &decision {
            Decision::Breach { user_rows, .. } => assert_eq!(user_rows.len(), 2),
            other => panic!("expected breach, got {other:?}"),
        }

        let records = store.list(QueryWindow::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_superset);
        assert_eq!(records[0].authorized_id, "user_by_id");
    }
}
