//! Structural extraction over a restricted read-statement dialect.
//!
//! Pattern-based, not grammar-based. The recognized dialect is a single
//! SELECT over one table or two comma-joined tables, optionally aliased,
//! with an optional WHERE clause bounded by GROUP/ORDER. Anything richer is
//! out of scope for static analysis and left to dynamic verification.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// The selected-column view of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSet {
    /// `SELECT *` — every column the tables expose.
    Wildcard,
    /// Lower-cased column terms kept verbatim (`t.col` stays one token).
    Named(BTreeSet<String>),
}

impl ColumnSet {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, ColumnSet::Wildcard)
    }
}

/// Non-owning structural view over one statement, recomputed per evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedShape {
    pub tables: BTreeSet<String>,
    pub columns: ColumnSet,
    /// Trimmed WHERE clause text; empty when the statement has none.
    pub filter: String,
}

fn tables_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // FROM t1 [alias] [, t2 [alias]] — at most two tables recognized.
        Regex::new(
            r"(?is)\bfrom\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s+\w+)?(?:\s*,\s*([A-Za-z_][A-Za-z0-9_]*)(?:\s+\w+)?)?",
        )
        .expect("valid pattern")
    })
}

fn columns_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\bselect\s+(.*?)\s+from\b").expect("valid pattern"))
}

fn filter_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\bwhere\b(.*?)(?:\bgroup\b|\border\b|$)").expect("valid pattern")
    })
}

/// Extract the structural shape of a statement. Pure function, no I/O.
pub fn extract(sql: &str) -> ExtractedShape {
    ExtractedShape {
        tables: extract_tables(sql),
        columns: extract_columns(sql),
        filter: filter_clause(sql),
    }
}

/// Referenced tables, lower-cased. Missing FROM yields the empty set.
pub fn extract_tables(sql: &str) -> BTreeSet<String> {
    match tables_pattern().captures(sql) {
        Some(caps) => caps
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().to_lowercase())
            .collect(),
        None => BTreeSet::new(),
    }
}

/// Selected columns between SELECT and the first FROM.
pub fn extract_columns(sql: &str) -> ColumnSet {
    let Some(caps) = columns_pattern().captures(sql) else {
        return ColumnSet::Named(BTreeSet::new());
    };
    let body = caps[1].trim();
    if body == "*" {
        return ColumnSet::Wildcard;
    }
    ColumnSet::Named(
        body.split(',')
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect(),
    )
}

/// Trimmed text between WHERE and the first GROUP/ORDER keyword or the end.
pub fn filter_clause(sql: &str) -> String {
    filter_pattern()
        .captures(sql)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}
