//! Keyword-level safety gate for generated SQL.
//!
//! This is a denylist scan, not a parser. Destructive syntax that is specific
//! to one dialect and not on the list can slip through; the database engine
//! (ideally opened read-only) is the backstop for those.
//!
//! Only the leading comments are lexed. The statement-separator and denylist
//! rules look at the raw text, so no quoting form (`'..'`, `E'..'`,
//! `$tag$..$tag$`, nested comments) can hide a `;` or a keyword from them.

use crate::query::models::{RejectionReason, SqlCandidate};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Statements that change data or structure
pub const DENYLIST: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "EXEC", "EXECUTE", "MERGE",
];

static DENYLIST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)\b({})\b", DENYLIST.join("|"));
    Regex::new(&pattern).expect("denylist pattern is valid")
});

/// Checks candidate text against the read-only policy. Rules apply in order
/// and the first failing rule decides the reason.
pub fn validate(candidate_text: &str) -> SqlCandidate {
    let body = skip_leading_trivia(candidate_text);

    let verdict = if body.is_empty() {
        Err(RejectionReason::Empty)
    } else if !leading_keyword(body).eq_ignore_ascii_case("SELECT") {
        Err(RejectionReason::NonSelectStatement)
    } else if has_second_statement(candidate_text) {
        Err(RejectionReason::MultipleStatements)
    } else if let Some(found) = DENYLIST_REGEX.find(candidate_text) {
        Err(RejectionReason::DisallowedKeyword(found.as_str().to_uppercase()))
    } else {
        Ok(())
    };

    let candidate = match verdict {
        Ok(()) => SqlCandidate::accepted(candidate_text),
        Err(reason) => SqlCandidate::rejected(candidate_text, reason),
    };

    if candidate.is_valid() {
        debug!("SQL accepted by validator");
    } else if let Some(reason) = candidate.rejection_reason() {
        warn!("SQL rejected by validator ({}): {}", reason, candidate.text());
    }
    candidate
}

fn leading_keyword(sql: &str) -> &str {
    let end = sql
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(sql.len());
    &sql[..end]
}

/// Skips whitespace, `--` line comments and `/* */` block comments at the
/// start of the text. Block comments nest, as they do in DuckDB's parser.
/// An unterminated block comment swallows the rest of the text.
fn skip_leading_trivia(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |i| &after[i + 1..]);
        } else if rest.starts_with("/*") {
            rest = skip_block_comment(rest);
        } else {
            return rest;
        }
    }
}

/// `sql` starts with `/*`; returns the text after the matching `*/`.
fn skip_block_comment(sql: &str) -> &str {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return &sql[i..];
                }
            }
            _ => i += 1,
        }
    }

    ""
}

/// True when a `;` anywhere in the text is followed by anything but
/// whitespace or further semicolons. Quotes and comments are not consulted.
fn has_second_statement(sql: &str) -> bool {
    match sql.find(';') {
        Some(i) => !sql[i + 1..]
            .trim_matches(|ch: char| ch.is_whitespace() || ch == ';')
            .is_empty(),
        None => false,
    }
}
