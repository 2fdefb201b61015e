//! Dataset access and audit persistence for the warden containment gate.
//!
//! This crate defines the two storage contracts the engine depends on:
//! - [`DatasetExecutor`] — read-only statement execution against the
//!   relational dataset under evaluation
//! - [`BreachStore`] — append-only audit persistence for non-safe outcomes
//!
//! Design stance:
//! - SQLite is the deployment backend; the in-memory adapters exist for
//!   deterministic tests and carry the same contracts.
//! - Adapters execute and persist; subset interpretation stays in the engine.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
pub mod sqlite;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryBreachLog, ScriptedExecutor};
pub use sqlite::SqliteDataset;
pub use traits::{BreachStore, DatasetExecutor, QueryWindow};
