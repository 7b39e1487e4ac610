//! Redirect rules and the path normalization they are matched with.

use serde::{Deserialize, Serialize};

use crate::domain::types::RedirectType;

/// Hard upper bound on the number of stored rules.
pub const MAX_REDIRECTS: usize = 500;

/// Marks a `from` value as a regular expression.
pub const REGEX_PREFIX: char = '~';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    pub from: String,
    pub to: String,
    #[serde(rename = "type", default)]
    pub kind: RedirectType,
    #[serde(default)]
    pub hits: u64,
}

impl RedirectRule {
    pub fn permanent(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind: RedirectType::Permanent,
            hits: 0,
        }
    }

    pub fn pattern(&self) -> RulePattern<'_> {
        match self.from.strip_prefix(REGEX_PREFIX) {
            Some(expression) => RulePattern::Regex(expression),
            None => RulePattern::Exact(&self.from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePattern<'a> {
    Exact(&'a str),
    /// Expression body without the `~` prefix. Matching is unanchored.
    Regex(&'a str),
}

/// Strips trailing slashes. The root path stays `/`.
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Returns true when `from` matches `path` either after normalization or
/// byte-for-byte.
pub fn exact_matches(from: &str, path: &str) -> bool {
    normalize_path(from) == normalize_path(path) || from == path
}
