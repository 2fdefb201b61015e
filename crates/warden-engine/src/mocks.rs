//! Test collaborators for gate wiring.
//!
//! The scripted dataset and in-memory breach log live with the store crate
//! ([`warden_store::ScriptedExecutor`], [`warden_store::MemoryBreachLog`]),
//! the canned oracles with the oracle crate ([`warden_oracle::FixedOracle`]).
//! This module adds the failure-mode doubles the engine's own tests need.

use async_trait::async_trait;
use warden_store::{BreachStore, QueryWindow, StoreError, StoreResult};
use warden_types::BreachRecord;

/// A breach store whose appends always fail, for exercising the gate's
/// best-effort audit path.
pub struct FailingBreachStore;

#[async_trait]
impl BreachStore for FailingBreachStore {
    async fn record(&self, _record: BreachRecord) -> StoreResult<()> {
        Err(StoreError::Backend("audit store unavailable".to_string()))
    }

    async fn list(&self, _window: QueryWindow) -> StoreResult<Vec<BreachRecord>> {
        Err(StoreError::Backend("audit store unavailable".to_string()))
    }
}
