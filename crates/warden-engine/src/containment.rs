//! Static containment analysis.
//!
//! Estimates structural subset-hood — tables, columns, filter predicates —
//! without executing anything. The filter check is an order- and
//! structure-insensitive token heuristic, not logical implication: it can
//! over-approve (`id = 1 OR id = 2` against `id = :uid`) and over-reject
//! (equivalent but differently worded clauses). Dynamic verification is the
//! ground truth behind it; this analyzer is the cheap pre-filter.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use warden_types::ContainmentVerdict;

use crate::safety;
use crate::shape::{self, ColumnSet};

/// Marker substituted for bindable positions on both sides of the filter
/// comparison. Upper case so it can never collide with the lower-cased
/// clause tokens around it.
const VALUE_MARKER: &str = "WILDCARD";

fn placeholder_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":\w+").expect("valid pattern"))
}

fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+(\.\d+)?\b").expect("valid pattern"))
}

fn single_quoted_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'[^']*'").expect("valid pattern"))
}

fn double_quoted_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[^"]*""#).expect("valid pattern"))
}

fn normalize_space(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Heuristic filter-predicate subset check.
///
/// Authorized `:name` placeholders and user literals both collapse to one
/// marker; the authorized clause's token set must then be a subset of the
/// user clause's. An empty authorized clause admits only an empty user
/// clause.
pub fn implies_subset(user_filter: &str, authorized_filter: &str) -> bool {
    let user = normalize_space(user_filter);
    let authorized = normalize_space(authorized_filter);

    if authorized.is_empty() {
        return user.is_empty();
    }

    let authorized = placeholder_pattern().replace_all(&authorized, VALUE_MARKER);
    let user = number_pattern().replace_all(&user, VALUE_MARKER);
    let user = single_quoted_pattern().replace_all(&user, VALUE_MARKER);
    let user = double_quoted_pattern().replace_all(&user, VALUE_MARKER);

    let authorized_tokens: BTreeSet<&str> = authorized.split_whitespace().collect();
    let user_tokens: BTreeSet<&str> = user.split_whitespace().collect();

    authorized_tokens.is_subset(&user_tokens)
}

fn lowercase_set(items: &BTreeSet<String>) -> BTreeSet<String> {
    items.iter().map(|item| item.to_lowercase()).collect()
}

/// Decide structural subset-hood of a submission against an authorized
/// query and its registered policy.
///
/// Re-runs the lexical gatekeeper first and stops early on failure; the
/// remaining rules are fail-fast, so the verdict carries the first violated
/// rule.
pub fn analyze(
    user_sql: &str,
    authorized_sql: &str,
    allowed_tables: &BTreeSet<String>,
    allowed_columns: &BTreeSet<String>,
) -> ContainmentVerdict {
    let lexical = safety::validate(user_sql);
    if !lexical.passed {
        return lexical;
    }

    let user = shape::extract(user_sql);
    let authorized = shape::extract(authorized_sql);

    if user.tables.is_empty() {
        return ContainmentVerdict::fail(vec![
            "could not extract any table from the submitted query".to_string(),
        ]);
    }

    let allowed_tables = lowercase_set(allowed_tables);
    if !user.tables.is_subset(&allowed_tables) {
        return ContainmentVerdict::fail(vec![format!(
            "submitted tables {:?} are not all in allowed tables {:?}",
            user.tables, allowed_tables
        )]);
    }

    if !user.tables.is_subset(&authorized.tables) {
        return ContainmentVerdict::fail(vec![format!(
            "submitted tables {:?} must be a subset of authorized tables {:?}",
            user.tables, authorized.tables
        )]);
    }

    match (&user.columns, &authorized.columns) {
        (ColumnSet::Wildcard, ColumnSet::Named(_)) => {
            return ContainmentVerdict::fail(vec![
                "submitted query selects '*' but the authorized query does not".to_string(),
            ]);
        }
        (ColumnSet::Named(user_cols), ColumnSet::Named(auth_cols)) => {
            if !user_cols.is_subset(auth_cols) {
                return ContainmentVerdict::fail(vec![format!(
                    "submitted columns {:?} must be a subset of authorized columns {:?}",
                    user_cols, auth_cols
                )]);
            }
            let allowed_columns = lowercase_set(allowed_columns);
            if !allowed_columns.is_empty() && !user_cols.is_subset(&allowed_columns) {
                return ContainmentVerdict::fail(vec![format!(
                    "submitted columns {:?} are not all in allowed columns {:?}",
                    user_cols, allowed_columns
                )]);
            }
        }
        _ => {}
    }

    if !implies_subset(&user.filter, &authorized.filter) {
        return ContainmentVerdict::fail(vec![
            "WHERE clause of the submitted query is not a subset of the authorized query's"
                .to_string(),
        ]);
    }

    ContainmentVerdict::pass("passed static containment checks")
}
