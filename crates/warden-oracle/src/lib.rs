//! Advisory containment signal capability.
//!
//! An oracle is an optional external source of opinion about whether one
//! read statement is contained by another. Its contract is deliberately
//! weak: it may have no opinion, and it can only ever narrow a provisional
//! safe verdict to a breach — it cannot promote a failing check. The gate
//! stays correct with the [`DisabledOracle`] wired in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tri-state advisory reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleHint {
    /// No opinion; the gate proceeds on its own checks.
    Unknown,
    /// The source agrees the submission is contained.
    Confirms,
    /// The source believes the submission is NOT contained.
    Vetoes,
}

/// Advisory signal capability consulted after static and dynamic checks.
///
/// Implementations never fail; anything that would be an error is `Unknown`.
#[async_trait]
pub trait ContainmentOracle: Send + Sync {
    async fn hint(&self, user_sql: &str, authorized_sql: &str) -> OracleHint;
}

/// The absent-oracle stub: always `Unknown`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOracle;

#[async_trait]
impl ContainmentOracle for DisabledOracle {
    async fn hint(&self, _user_sql: &str, _authorized_sql: &str) -> OracleHint {
        OracleHint::Unknown
    }
}

/// An oracle that always answers the same way. Test double.
#[derive(Debug, Clone, Copy)]
pub struct FixedOracle(pub OracleHint);

impl FixedOracle {
    pub fn confirm_all() -> Self {
        Self(OracleHint::Confirms)
    }

    pub fn veto_all() -> Self {
        Self(OracleHint::Vetoes)
    }

    pub fn silent() -> Self {
        Self(OracleHint::Unknown)
    }
}

#[async_trait]
impl ContainmentOracle for FixedOracle {
    async fn hint(&self, _user_sql: &str, _authorized_sql: &str) -> OracleHint {
        self.0
    }
}

/// Failure from an external advisory transport.
#[derive(Debug, thiserror::Error)]
#[error("advisory source unavailable: {0}")]
pub struct SourceError(pub String);

/// A fallible external signal source, e.g. a remote model endpoint.
///
/// `Ok(None)` means the source ran but has no opinion.
#[async_trait]
pub trait AdvisorySource: Send + Sync {
    async fn assess(&self, user_sql: &str, authorized_sql: &str)
        -> Result<Option<bool>, SourceError>;
}

/// Normalizes a fallible [`AdvisorySource`] into the never-failing oracle
/// contract: transport failures and absent opinions both map to `Unknown`.
pub struct AdvisoryAdapter<S> {
    source: S,
}

impl<S> AdvisoryAdapter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: AdvisorySource> ContainmentOracle for AdvisoryAdapter<S> {
    async fn hint(&self, user_sql: &str, authorized_sql: &str) -> OracleHint {
        match self.source.assess(user_sql, authorized_sql).await {
            Ok(Some(true)) => OracleHint::Confirms,
            Ok(Some(false)) => OracleHint::Vetoes,
            Ok(None) => OracleHint::Unknown,
            Err(err) => {
                warn!(error = %err, "advisory source failed; treating as unknown");
                OracleHint::Unknown
            }
        }
    }
}
