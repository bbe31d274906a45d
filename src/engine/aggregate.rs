// src/engine/aggregate.rs

//! Summary counts and report rows.

use std::collections::HashMap;

use crate::engine::filter::MatchFilter;
use crate::engine::range::{matches_differential, matches_minute, matches_total, matches_value};
use crate::models::{
    CategoryPath, Goal, Horizon, Match, NoInfoEntry, RangeBlock, ReportConfig, ReportRow, Score,
    ScoreMetric, TrimPolicy,
};

/// Score the summary is computed on.
pub fn summary_score(m: &Match, horizon: Horizon) -> Score {
    match horizon {
        Horizon::HalfTime => m.half_time,
        Horizon::FullTime => m.full_time,
    }
}

fn metric_value(score: Score, metric: ScoreMetric) -> i64 {
    match metric {
        ScoreMetric::Total => score.total(),
        ScoreMetric::Differential => score.diff(),
    }
}

fn goal_matches_metric(goal: &Goal, token: &str, metric: ScoreMetric) -> bool {
    match metric {
        ScoreMetric::Total => matches_total(goal, token),
        ScoreMetric::Differential => matches_differential(goal, token),
    }
}

/// Drop boundary-minute matches: a `trim` share of those with a goal at
/// exactly `boundary`, taken in input order, and every match with a goal at
/// `boundary+<extra>`.
pub fn trim_boundary<'a>(selected: &[&'a Match], boundary: u32, trim: TrimPolicy) -> Vec<&'a Match> {
    let at_boundary = selected.iter().filter(|m| m.has_goal_at(boundary)).count();
    let mut to_remove = trim.removal_count(at_boundary);

    selected
        .iter()
        .copied()
        .filter(|m| {
            if m.has_goal_at(boundary) && to_remove > 0 {
                to_remove -= 1;
                return false;
            }
            !m.has_stoppage_goal_after(boundary)
        })
        .collect()
}

/// Number of matches in `group` whose summary score satisfies `token`,
/// after boundary trimming.
pub fn summary_count(group: &[&Match], token: &str, report: ReportConfig) -> usize {
    let selected: Vec<&Match> = group
        .iter()
        .copied()
        .filter(|m| matches_value(metric_value(summary_score(m, report.horizon), report.metric), token))
        .collect();

    trim_boundary(&selected, report.horizon.boundary_minute(), report.trim()).len()
}

/// Matches having at least one goal in `minute_token` whose prior score
/// satisfies `range_token`.
pub fn bucket_count(group: &[&Match], minute_token: &str, range_token: &str, metric: ScoreMetric) -> usize {
    group
        .iter()
        .filter(|m| {
            m.goals.iter().any(|g| {
                matches_minute(g, minute_token) && goal_matches_metric(g, range_token, metric)
            })
        })
        .count()
}

/// Group by category path in first-seen order after a stable sort on
/// display order.
pub fn group_by_category<'a>(matches: &[&'a Match]) -> Vec<(CategoryPath, Vec<&'a Match>)> {
    let mut sorted = matches.to_vec();
    sorted.sort_by_key(|m| m.order);

    let mut groups: Vec<(CategoryPath, Vec<&'a Match>)> = Vec::new();
    let mut index: HashMap<&CategoryPath, usize> = HashMap::new();
    for m in sorted {
        match index.get(&m.path) {
            Some(&i) => groups[i].1.push(m),
            None => {
                index.insert(&m.path, groups.len());
                groups.push((m.path.clone(), vec![m]));
            }
        }
    }
    groups
}

fn row_for(
    path: &CategoryPath,
    group: &[&Match],
    no_info: usize,
    filter: &MatchFilter,
    report: ReportConfig,
) -> ReportRow {
    let blocks = filter
        .range_tokens(report.metric)
        .iter()
        .map(|token| RangeBlock {
            token: token.clone(),
            bucket_counts: filter
                .minute_tokens()
                .iter()
                .map(|minute| bucket_count(group, minute, token, report.metric))
                .collect(),
            summary: summary_count(group, token, report),
        })
        .collect();

    ReportRow {
        country: path.country().to_string(),
        league: path.league().to_string(),
        season: path.season().to_string(),
        blocks,
        no_info,
    }
}

/// One row per category path.
///
/// Every parsed match is counted; `filter` only supplies the minute and
/// range tokens. Categories only known from `no_info` come last.
pub fn build_report(
    matches: &[Match],
    no_info: &[NoInfoEntry],
    filter: &MatchFilter,
    report: ReportConfig,
) -> Vec<ReportRow> {
    let all: Vec<&Match> = matches.iter().collect();
    let groups = group_by_category(&all);

    let mut no_info_counts: HashMap<&CategoryPath, usize> = HashMap::new();
    for entry in no_info {
        *no_info_counts.entry(&entry.path).or_default() += 1;
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (path, group) in &groups {
        let missing = no_info_counts.remove(path).unwrap_or(0);
        rows.push(row_for(path, group, missing, filter, report));
    }

    // Remaining no-info categories, by lowest order then first appearance.
    let mut orphans: Vec<(&CategoryPath, usize)> = Vec::new();
    for entry in no_info {
        if no_info_counts.contains_key(&entry.path) && !orphans.iter().any(|(p, _)| *p == &entry.path) {
            let order = no_info
                .iter()
                .filter(|e| e.path == entry.path)
                .map(|e| e.order)
                .min()
                .unwrap_or(entry.order);
            orphans.push((&entry.path, order));
        }
    }
    orphans.sort_by_key(|(_, order)| *order);
    for (path, _) in orphans {
        let missing = no_info_counts.get(path).copied().unwrap_or(0);
        rows.push(row_for(path, &[], missing, filter, report));
    }

    rows
}
