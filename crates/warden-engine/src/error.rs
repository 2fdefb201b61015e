use thiserror::Error;

/// Errors from the containment evaluation pipeline.
///
/// Only the client-caused policy error escapes to the caller; every other
/// failure mode is converted into a [`warden_types::Decision`] locally.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submission referenced an id the operator never registered.
    /// Client-caused; nothing is executed or audited for it.
    #[error("unknown authorized query id: {0}")]
    UnknownAuthorizedQuery(String),

    /// The dataset engine rejected or failed to run a statement.
    #[error("{0}")]
    Execution(String),
}
