//! Authorized-query registry.
//!
//! The registry is a static configuration resource: an ordered collection of
//! [`AuthorizedQuery`] records keyed by id, loaded once and treated as
//! read-only for the lifetime of the process. The engine reaches it through
//! the [`AuthorizedQueryProvider`] capability so tests can substitute a
//! hand-built collection.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;
use warden_types::AuthorizedQuery;

/// Errors raised while loading or querying the registry document.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read registry file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("registry document is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("duplicate authorized query id: {0}")]
    DuplicateId(String),
}

/// Read-only lookup capability over registered authorized queries.
pub trait AuthorizedQueryProvider: Send + Sync {
    /// Exact-id lookup; `None` means the id is unknown to the operator.
    fn lookup(&self, id: &str) -> Option<AuthorizedQuery>;
}

/// Ordered collection of authorized queries backed by a JSON document.
///
/// The document is a JSON array of records:
/// `[{"id": ..., "sql": ..., "params": [...], "allowed_tables": [...],
///   "allowed_columns": [...]}, ...]`.
#[derive(Debug, Clone, Default)]
pub struct QueryRegistry {
    entries: Vec<AuthorizedQuery>,
}

impl QueryRegistry {
    /// Build a registry from already-parsed records, preserving order.
    pub fn new(entries: Vec<AuthorizedQuery>) -> Result<Self, RegistryError> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if !seen.insert(entry.id.clone()) {
                return Err(RegistryError::DuplicateId(entry.id.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Parse a registry from its JSON text.
    pub fn from_json(document: &str) -> Result<Self, RegistryError> {
        let entries: Vec<AuthorizedQuery> = serde_json::from_str(document)?;
        Self::new(entries)
    }

    /// Load a registry document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_json(&document)?;
        info!(
            path = %path.display(),
            entries = registry.len(),
            "loaded authorized query registry"
        );
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered queries in document order.
    pub fn entries(&self) -> &[AuthorizedQuery] {
        &self.entries
    }
}

impl AuthorizedQueryProvider for QueryRegistry {
    fn lookup(&self, id: &str) -> Option<AuthorizedQuery> {
        self.entries.iter().find(|entry| entry.id == id).cloned()
    }
}
