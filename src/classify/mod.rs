use std::fmt;

use clap::ValueEnum;
use lazy_static::lazy_static;
use regex::Regex;

mod scanner;

use scanner::skip_leading_trivia;

/// Coarse statement category used to pick a statement variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum StatementKind {
    /// Row-returning read (`SELECT`, `WITH`, and anything unrecognised).
    Query,
    /// Data modification (`INSERT`, `UPDATE`, `DELETE`, `MERGE`).
    Dml,
    /// Schema change (`CREATE`, `ALTER`, `DROP`, ...).
    Ddl,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Query => f.write_str("query"),
            StatementKind::Dml => f.write_str("DML"),
            StatementKind::Ddl => f.write_str("DDL"),
        }
    }
}

lazy_static! {
    static ref LEADING_KEYWORD: Regex = Regex::new(r"^[A-Za-z_]+").expect("static keyword regex");
}

const DML_KEYWORDS: &[&str] = &["INSERT", "UPDATE", "DELETE", "MERGE"];
const DDL_KEYWORDS: &[&str] = &[
    "CREATE", "ALTER", "DROP", "TRUNCATE", "GRANT", "REVOKE", "RENAME", "ANALYZE",
];

/// Classify a statement by its first keyword.
///
/// Leading whitespace, `--`/`#`/`/* */` comments, opening parentheses and `@{...}` hints are
/// skipped. This is keyword matching only; the text is never parsed.
#[must_use]
pub fn classify(sql: &str) -> StatementKind {
    let start = skip_leading_trivia(sql.as_bytes());
    let Some(keyword) = LEADING_KEYWORD.find(&sql[start..]) else {
        return StatementKind::Query;
    };
    let keyword = keyword.as_str().to_ascii_uppercase();

    if DML_KEYWORDS.contains(&keyword.as_str()) {
        StatementKind::Dml
    } else if DDL_KEYWORDS.contains(&keyword.as_str()) {
        StatementKind::Ddl
    } else {
        StatementKind::Query
    }
}
