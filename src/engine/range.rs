// src/engine/range.rs

//! Range expressions.
//!
//! An expression is a list of tokens split by a separator. Each token is a
//! bare number (`"2"`) or an inclusive span (`"0-1"`). Minute tokens also
//! accept stoppage-time prefixes such as `"45+"`.

use std::str::FromStr;

use crate::models::Goal;

/// A numeric range token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeToken {
    Exact(i64),
    /// Inclusive on both ends
    Span(i64, i64),
}

impl RangeToken {
    pub fn contains(self, value: i64) -> bool {
        match self {
            Self::Exact(n) => value == n,
            Self::Span(lo, hi) => lo <= value && value <= hi,
        }
    }
}

impl FromStr for RangeToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((lo, hi)) = s.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.trim().parse(), hi.trim().parse()) {
                return Ok(Self::Span(lo, hi));
            }
        }
        s.parse()
            .map(Self::Exact)
            .map_err(|_| format!("invalid range token '{s}'"))
    }
}

/// Split an expression into trimmed, non-empty tokens.
pub fn split_tokens(expression: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        let token = expression.trim();
        return if token.is_empty() {
            Vec::new()
        } else {
            vec![token.to_string()]
        };
    }
    expression
        .split(separator)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Does the goal's minute label fall under `token`?
///
/// `"N-M"` matches labels that are literally one of the integers N..=M, so
/// `"45+2"` is not inside `"40-45"`. A token containing `+` is a
/// case-insensitive prefix, anything else a case-insensitive equality.
pub fn matches_minute(goal: &Goal, token: &str) -> bool {
    let label = goal.minute.trim();
    let token = token.trim();

    if token.contains('+') {
        return label.to_lowercase().starts_with(&token.to_lowercase());
    }
    if let Ok(RangeToken::Span(lo, hi)) = token.parse() {
        return (lo..=hi).any(|minute| label == minute.to_string());
    }
    label.eq_ignore_ascii_case(token)
}

/// Score value against a range token; malformed tokens never match.
pub fn matches_value(value: i64, token: &str) -> bool {
    token
        .parse::<RangeToken>()
        .is_ok_and(|range| range.contains(value))
}

/// Sum of the score before the goal.
pub fn matches_total(goal: &Goal, token: &str) -> bool {
    matches_value(goal.score_before.total(), token)
}

/// Absolute difference of the score before the goal.
pub fn matches_differential(goal: &Goal, token: &str) -> bool {
    matches_value(goal.score_before.diff(), token)
}
