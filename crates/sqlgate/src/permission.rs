//! Permission gate: decides whether a statement may run under a mode.
//!
//! Classification looks only at the statement's leading keyword. Comments
//! before the keyword, DML wrapped in a `WITH` clause, and later statements
//! of a multi-statement batch are not inspected.

use crate::mode::Mode;

/// Leading keywords refused in `readonly` mode.
const READONLY_DENIED: &[&str] = &[
    "insert", "update", "delete", "drop", "truncate", "alter", "create", "grant", "revoke",
    "comment", "set", "copy", "unload", "vacuum", "analyze", "merge",
];

/// Leading keywords refused in `readwrite` mode.
const READWRITE_DENIED: &[&str] = &[
    "delete", "drop", "truncate", "alter", "grant", "revoke", "comment", "set", "copy", "unload",
    "vacuum", "analyze", "merge",
];

/// Outcome of classifying one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny { reason: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

impl Mode {
    /// Leading keywords this mode refuses (lower-case).
    pub fn denied_keywords(self) -> &'static [&'static str] {
        match self {
            Mode::Readonly => READONLY_DENIED,
            Mode::Readwrite => READWRITE_DENIED,
            Mode::Admin => &[],
        }
    }
}

/// First whitespace-delimited token of `sql`, lower-cased. Empty for a blank statement.
pub fn leading_keyword(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Classify `sql` under `mode`.
pub fn classify(sql: &str, mode: Mode) -> Verdict {
    let keyword = leading_keyword(sql);
    if mode.denied_keywords().contains(&keyword.as_str()) {
        Verdict::Deny {
            reason: format!(
                "'{}' statements are not allowed in {} mode.",
                keyword.to_uppercase(),
                mode
            ),
        }
    } else {
        Verdict::Allow
    }
}
