//! Shared data model for the warden containment gate.
//!
//! These types cross every crate boundary in the workspace: the registry
//! loads [`AuthorizedQuery`] records, the engine evaluates a
//! [`SubmittedRequest`] into a [`Decision`], and the audit store persists a
//! [`BreachRecord`] for every non-safe outcome.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-supplied parameter bindings, name -> JSON value.
pub type ParamMap = BTreeMap<String, Value>;

/// A row rendered as a JSON object for response payloads.
pub type JsonObject = serde_json::Map<String, Value>;

/// An operator-approved, parameterized read statement.
///
/// Defines the maximum data a given access pattern may return. Loaded from
/// the registry document and never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedQuery {
    /// Unique registry identifier.
    pub id: String,
    /// Read statement template with `:name` placeholders.
    pub sql: String,
    /// Placeholder names in declaration order.
    #[serde(default)]
    pub params: Vec<String>,
    /// Tables a submitted query may reference under this id.
    #[serde(default)]
    pub allowed_tables: BTreeSet<String>,
    /// Columns a submitted query may select under this id.
    #[serde(default)]
    pub allowed_columns: BTreeSet<String>,
}

/// One untrusted submission, alive for the duration of a single evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedRequest {
    /// Registry id of the authorized query this submission claims to match.
    pub authorized_id: String,
    /// The ad-hoc read statement as received.
    pub sql: String,
    /// Named parameter bindings for the authorized template.
    #[serde(default)]
    pub params: ParamMap,
}

/// Outcome of a static check: pass/fail plus the accumulated reason trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainmentVerdict {
    pub passed: bool,
    pub reasons: Vec<String>,
}

impl ContainmentVerdict {
    /// A passing verdict with a single confirmatory reason.
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reasons: vec![reason.into()],
        }
    }

    /// A failing verdict carrying every violated rule.
    pub fn fail(reasons: Vec<String>) -> Self {
        Self {
            passed: false,
            reasons,
        }
    }

    /// Reasons joined for operator diagnosis.
    pub fn reason_trail(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Rows produced by executing one read statement.
///
/// Column order is the first row's column order as reported by the dataset
/// engine; an empty result has no rows and no observed columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Canonical tuple set for subset comparison.
    ///
    /// Each row is rendered to its JSON array text in this result's own
    /// column order. An empty result yields the empty set, which is a subset
    /// of anything.
    pub fn tuple_set(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .map(|row| Value::Array(row.clone()).to_string())
            .collect()
    }

    /// True when every row tuple here also appears in `other`.
    pub fn is_subset_of(&self, other: &ResultSet) -> bool {
        self.tuple_set().is_subset(&other.tuple_set())
    }

    /// Rows as JSON objects keyed by column name, for response payloads.
    pub fn to_objects(&self) -> Vec<JsonObject> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Terminal outcome of one evaluation.
///
/// A closed set of variants so the combinator's state machine is checked
/// exhaustively. Row payloads are present exactly when both queries
/// executed (safe and breach); a rejection never ran anything to show.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    /// Submitted results are contained in the authorized results.
    Safe {
        reason: String,
        user_rows: Vec<JsonObject>,
        authorized_rows: Vec<JsonObject>,
    },
    /// Static/lexical failure or execution error; nothing to display.
    Rejected { reason: String },
    /// Executed results escaped the authorized result set, or the advisory
    /// oracle vetoed a provisional safe.
    Breach {
        reason: String,
        user_rows: Vec<JsonObject>,
        authorized_rows: Vec<JsonObject>,
    },
}

impl Decision {
    pub fn is_safe(&self) -> bool {
        matches!(self, Decision::Safe { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            Decision::Safe { reason, .. }
            | Decision::Rejected { reason }
            | Decision::Breach { reason, .. } => reason,
        }
    }

    /// Stable lowercase label for logs and persistence.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Decision::Safe { .. } => "safe",
            Decision::Rejected { .. } => "rejected",
            Decision::Breach { .. } => "breach",
        }
    }
}

/// Append-only audit row persisted for every non-safe outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachRecord {
    /// Storage-assigned record id.
    pub record_id: String,
    pub authorized_id: String,
    pub user_sql: String,
    pub reason: String,
    /// True when the submitted result set escaped the authorized one.
    pub is_superset: bool,
    pub created_at: DateTime<Utc>,
    /// Opaque context blob (caller params, authorized SQL on breaches).
    pub metadata: Value,
}

impl BreachRecord {
    /// Build a record stamped now with a fresh id.
    pub fn new(
        authorized_id: impl Into<String>,
        user_sql: impl Into<String>,
        reason: impl Into<String>,
        is_superset: bool,
        metadata: Value,
    ) -> Self {
        Self {
            record_id: format!("breach-{}", uuid::Uuid::new_v4()),
            authorized_id: authorized_id.into(),
            user_sql: user_sql.into(),
            reason: reason.into(),
            is_superset,
            created_at: Utc::now(),
            metadata,
        }
    }
}
