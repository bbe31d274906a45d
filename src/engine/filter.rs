// src/engine/filter.rs

//! Per-match filters built from the configured range expressions.

use crate::engine::range::{matches_differential, matches_minute, matches_total, split_tokens};
use crate::models::{FilterConfig, Goal, Match, ScoreMetric};

/// Tokenized minute, total and differential expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFilter {
    minutes: Vec<String>,
    totals: Vec<String>,
    differentials: Vec<String>,
}

impl MatchFilter {
    pub fn new(minutes: Vec<String>, totals: Vec<String>, differentials: Vec<String>) -> Self {
        Self {
            minutes,
            totals,
            differentials,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            split_tokens(&config.minutes, &config.separator),
            split_tokens(&config.totals, &config.separator),
            split_tokens(&config.differentials, &config.separator),
        )
    }

    pub fn minute_tokens(&self) -> &[String] {
        &self.minutes
    }

    pub fn total_tokens(&self) -> &[String] {
        &self.totals
    }

    pub fn differential_tokens(&self) -> &[String] {
        &self.differentials
    }

    /// Range tokens the report buckets on.
    pub fn range_tokens(&self, metric: ScoreMetric) -> &[String] {
        match metric {
            ScoreMetric::Total => &self.totals,
            ScoreMetric::Differential => &self.differentials,
        }
    }

    /// Goal falls in any minute bucket, or there are no buckets.
    pub fn goal_in_minutes(&self, goal: &Goal) -> bool {
        self.minutes.is_empty() || self.minutes.iter().any(|t| matches_minute(goal, t))
    }

    pub fn passes_minute(&self, m: &Match) -> bool {
        self.minutes.is_empty() || m.goals.iter().any(|g| self.goal_in_minutes(g))
    }

    pub fn passes_total(&self, m: &Match) -> bool {
        self.passes_scored(m, &self.totals, matches_total)
    }

    pub fn passes_differential(&self, m: &Match) -> bool {
        self.passes_scored(m, &self.differentials, matches_differential)
    }

    /// Some goal matches a (minute, range) pair. With no minute tokens only
    /// the range token has to match.
    fn passes_scored(&self, m: &Match, tokens: &[String], test: fn(&Goal, &str) -> bool) -> bool {
        tokens.is_empty()
            || m.goals
                .iter()
                .any(|g| self.goal_in_minutes(g) && tokens.iter().any(|t| test(g, t)))
    }

    /// Minute filter plus the range filter of the active `metric`; the
    /// other metric's tokens are ignored.
    pub fn passes(&self, m: &Match, metric: ScoreMetric) -> bool {
        self.passes_minute(m)
            && match metric {
                ScoreMetric::Total => self.passes_total(m),
                ScoreMetric::Differential => self.passes_differential(m),
            }
    }

    /// Matches passing the filter for `metric`, in input order.
    pub fn apply<'a>(&self, matches: &'a [Match], metric: ScoreMetric) -> Vec<&'a Match> {
        matches.iter().filter(|m| self.passes(m, metric)).collect()
    }
}
