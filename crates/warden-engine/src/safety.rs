//! Lexical gatekeeper for submitted statements.
//!
//! First line of the layered defense: everything that is not a single,
//! comment-free SELECT statement is turned away before any structural or
//! dynamic analysis runs. Violations accumulate so the operator sees every
//! reason at once, not just the first.

use std::sync::OnceLock;

use regex::Regex;
use warden_types::ContainmentVerdict;

/// Symbolic tokens blocked anywhere in the text, substring match.
const FORBIDDEN_TOKENS: &[&str] = &[";", "--", "/*", "*/"];

/// Keywords blocked only as standalone words, so identifiers that merely
/// contain one (`created_at`, `updated_by`) pass.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "drop", "insert", "update", "delete", "alter", "create", "attach", "pragma", "vacuum",
    "grant", "revoke", "truncate",
];

fn select_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)^\s*select\b").expect("valid pattern"))
}

fn keyword_patterns() -> &'static Vec<(&'static str, Regex)> {
    static RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RES.get_or_init(|| {
        FORBIDDEN_KEYWORDS
            .iter()
            .map(|kw| {
                (
                    *kw,
                    Regex::new(&format!(r"\b{kw}\b")).expect("valid pattern"),
                )
            })
            .collect()
    })
}

fn union_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bunion\b").expect("valid pattern"))
}

/// Validate that a submission is a single bare SELECT statement.
///
/// Pure function over the text; every violated rule lands in the verdict's
/// reason list.
pub fn validate(sql: &str) -> ContainmentVerdict {
    let mut reasons = Vec::new();
    let trimmed = sql.trim();

    if !select_prefix().is_match(trimmed) {
        reasons.push("only single SELECT statements are allowed".to_string());
    }

    let lowered = trimmed.to_lowercase();

    for token in FORBIDDEN_TOKENS {
        if lowered.contains(token) {
            reasons.push(format!("forbidden token detected: {token}"));
        }
    }

    for (keyword, pattern) in keyword_patterns() {
        if pattern.is_match(&lowered) {
            reasons.push(format!("forbidden keyword detected: {keyword}"));
        }
    }

    if union_pattern().is_match(&lowered) {
        reasons.push("UNION is not allowed".to_string());
    }

    // Covers trailing statements even when the leading character is itself
    // the terminator (already caught by the token scan above).
    if trimmed.get(1..).is_some_and(|rest| rest.contains(';')) {
        reasons.push("multiple statements or semicolons are not allowed".to_string());
    }

    if reasons.is_empty() {
        ContainmentVerdict::pass("passed lexical safety checks")
    } else {
        ContainmentVerdict::fail(reasons)
    }
}
