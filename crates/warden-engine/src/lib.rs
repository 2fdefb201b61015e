//! Containment decision engine.
//!
//! Decides whether an untrusted read statement can only ever return a subset
//! of what a matching operator-authorized query returns. Layered defense,
//! evaluated strictly in order by [`ContainmentGate`]:
//!
//! 1. **Lexical gatekeeper** ([`safety`]) — single bare SELECT or nothing.
//! 2. **Structural extraction** ([`shape`]) — tables, columns, filter text
//!    over a restricted dialect.
//! 3. **Static containment** ([`containment`]) — table/column/filter subset
//!    estimation against the registered policy. A cheap pre-filter.
//! 4. **Dynamic verification** ([`verifier`]) — execute both statements and
//!    compare true result tuple sets. The ground truth.
//! 5. **Advisory consultation** — an optional oracle may veto a provisional
//!    safe; it can never approve past a failed check.
//!
//! Every non-safe outcome is appended to the breach store with enough
//! context to reconstruct the decision.

pub mod containment;
pub mod error;
pub mod gate;
pub mod mocks;
pub mod safety;
pub mod shape;
pub mod verifier;

pub use error::EngineError;
pub use gate::{ContainmentGate, GateConfig};
pub use shape::{ColumnSet, ExtractedShape};
pub use verifier::{DynamicVerifier, VerifiedPair};
