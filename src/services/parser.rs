// src/services/parser.rs

//! Match and listing page parsers.
//!
//! Selectors come from [`SiteSelectors`] and are compiled once per parser.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    CategoryPath, Goal, GoalKind, Match, MatchBuilder, NoInfoReason, Score, SiteSelectors,
};
use crate::utils::url::page_index;
use crate::utils::{clean_text, resolve_url};

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn parse_regex(s: &str) -> Result<Regex> {
    Regex::new(s).map_err(|e| AppError::config(format!("invalid pattern '{s}': {e}")))
}

fn text_of(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Result of parsing a match page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Match(Match),
    NoInfo(NoInfoReason),
}

/// Parser for match detail pages.
pub struct MatchPageParser {
    date: Selector,
    date_format: String,
    home_team: Selector,
    guest_team: Selector,
    final_score: Selector,
    event_row: Selector,
    event_code: Regex,
    minute: Regex,
    home_marker: String,
    guest_marker: String,
    minute_cell: Selector,
    score_cell: Selector,
    home_cell: Selector,
    guest_cell: Selector,
}

impl MatchPageParser {
    pub fn new(selectors: &SiteSelectors) -> Result<Self> {
        Ok(Self {
            date: parse_selector(&selectors.match_date)?,
            date_format: selectors.date_format.clone(),
            home_team: parse_selector(&selectors.home_team)?,
            guest_team: parse_selector(&selectors.guest_team)?,
            final_score: parse_selector(&selectors.final_score)?,
            event_row: parse_selector(&selectors.event_row)?,
            event_code: parse_regex(&selectors.event_code_pattern)?,
            minute: parse_regex(r"^(\d+)(?:\s*\+\s*(\d+))?")?,
            home_marker: selectors.home_marker.clone(),
            guest_marker: selectors.guest_marker.clone(),
            minute_cell: parse_selector(&selectors.minute_cell)?,
            score_cell: parse_selector(&selectors.score_cell)?,
            home_cell: parse_selector(&selectors.home_cell)?,
            guest_cell: parse_selector(&selectors.guest_cell)?,
        })
    }

    /// Parse a match page found under `path` at sibling position `order`.
    pub fn parse_match(
        &self,
        html: &str,
        url: &str,
        path: &CategoryPath,
        order: usize,
    ) -> Result<ParseOutcome> {
        let document = Html::parse_document(html);

        let rows: Vec<ElementRef<'_>> = document.select(&self.event_row).collect();
        if rows.is_empty() {
            return Ok(ParseOutcome::NoInfo(NoInfoReason::EmptyEventTable));
        }

        let date = self.parse_date(&document, url)?;
        let home = self.required_text(&document, &self.home_team, url, "home team")?;
        let guest = self.required_text(&document, &self.guest_team, url, "guest team")?;

        let mut half_time = None;
        let mut full_time = None;
        let mut goals = Vec::new();

        for (index, &row) in rows.iter().enumerate() {
            let class = row.value().attr("class").unwrap_or("");
            let kind = self.event_kind(class);
            if kind.is_some_and(|k| !k.is_scoring()) {
                continue;
            }

            let (minute, primary) = self.minute_label(row);
            match primary {
                Some(m) if m <= 45 => half_time = Some(self.row_score(row, url)?),
                Some(m) if m <= 90 => full_time = Some(self.row_score(row, url)?),
                _ => {}
            }

            let (team, cell) = if has_marker(class, &self.home_marker) {
                (&home, &self.home_cell)
            } else if has_marker(class, &self.guest_marker) {
                (&guest, &self.guest_cell)
            } else {
                continue;
            };
            let Some(kind) = kind else {
                log::debug!("Row '{}' at {} in {} has no event code", class, minute, url);
                continue;
            };

            let score_before = match index.checked_sub(1) {
                Some(previous) => self.row_score(rows[previous], url)?,
                None => Score::default(),
            };
            let player = row.select(cell).next().map(text_of).unwrap_or_default();

            goals.push(Goal {
                kind,
                minute,
                score_before,
                team: team.clone(),
                player,
            });
        }

        if goals.is_empty() && !self.parse_final_score(&document, url)?.is_nil() {
            return Ok(ParseOutcome::NoInfo(NoInfoReason::MissingGoals));
        }
        let boundary = |minute: &str| goals.iter().filter(|g| g.minute == minute).count() > 1;
        if boundary("45") || boundary("90") {
            log::debug!("Rejecting {}: duplicate goals at minute 45 or 90", url);
            return Ok(ParseOutcome::NoInfo(NoInfoReason::BoundaryMinuteAnomaly));
        }

        let found = MatchBuilder::new(date, home, guest, path.clone(), order, url)
            .half_time(half_time)
            .full_time(full_time)
            .goals(goals)
            .build();
        Ok(ParseOutcome::Match(found))
    }

    fn parse_date(&self, document: &Html, url: &str) -> Result<NaiveDateTime> {
        let text = self.required_text(document, &self.date, url, "date")?;
        NaiveDateTime::parse_from_str(&text, &self.date_format)
            .map_err(|e| AppError::parse(url, format!("bad date '{text}': {e}")))
    }

    fn required_text(
        &self,
        document: &Html,
        selector: &Selector,
        url: &str,
        what: &str,
    ) -> Result<String> {
        document
            .select(selector)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::parse(url, format!("missing {what}")))
    }

    /// Displayed final score; an absent element counts as 0-0.
    fn parse_final_score(&self, document: &Html, url: &str) -> Result<Score> {
        match document.select(&self.final_score).next().map(text_of) {
            Some(text) if !text.is_empty() => text
                .parse()
                .map_err(|e: String| AppError::parse(url, e)),
            _ => Ok(Score::default()),
        }
    }

    /// Score in a row's result cell; blank or garbled text is a parse error.
    fn row_score(&self, row: ElementRef<'_>, url: &str) -> Result<Score> {
        let text = row
            .select(&self.score_cell)
            .next()
            .map(text_of)
            .unwrap_or_default();
        text.parse().map_err(|e: String| AppError::parse(url, e))
    }

    fn event_kind(&self, class: &str) -> Option<GoalKind> {
        let code = self.event_code.captures(class)?.get(1)?.as_str().parse().ok()?;
        GoalKind::from_code(code)
    }

    /// Minute label ("67", "45+2") and its primary minute.
    fn minute_label(&self, row: ElementRef<'_>) -> (String, Option<u32>) {
        let raw = row
            .select(&self.minute_cell)
            .next()
            .map(text_of)
            .unwrap_or_default();
        let raw = raw.trim_end_matches(['\'', '’']).trim().to_string();

        let Some(caps) = self.minute.captures(&raw) else {
            return (raw, None);
        };
        let primary = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let label = match (caps.get(1), caps.get(2)) {
            (Some(m), Some(extra)) => format!("{}+{}", m.as_str(), extra.as_str()),
            (Some(m), None) => m.as_str().to_string(),
            _ => raw.clone(),
        };
        (label, primary)
    }
}

/// Class attribute contains `marker`, ignoring case.
fn has_marker(class: &str, marker: &str) -> bool {
    !marker.is_empty() && class.to_lowercase().contains(&marker.to_lowercase())
}

/// A match link on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchLink {
    pub url: String,
    /// Link text, e.g. "2:1" or "P-P"
    pub label: String,
}

impl MatchLink {
    pub fn is_postponed(&self, markers: &[String]) -> bool {
        is_postponed(&self.label, markers)
    }
}

/// Link text carries one of the postponed/cancelled markers.
pub fn is_postponed(label: &str, markers: &[String]) -> bool {
    let label = label.to_lowercase();
    markers
        .iter()
        .any(|m| !m.is_empty() && label.contains(&m.to_lowercase()))
}

/// Parser for match listing pages.
pub struct ListingPageParser {
    link: Selector,
    next: Selector,
    page_index: Regex,
}

impl ListingPageParser {
    pub fn new(selectors: &SiteSelectors) -> Result<Self> {
        Ok(Self {
            link: parse_selector(&selectors.listing_link)?,
            next: parse_selector(&selectors.next_page)?,
            page_index: parse_regex(&selectors.page_index_pattern)?,
        })
    }

    /// Match detail links in document order, without duplicates.
    pub fn match_links(&self, html: &str, base_url: &str) -> Result<Vec<MatchLink>> {
        let base = Url::parse(base_url)?;
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();

        Ok(document
            .select(&self.link)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                Some(MatchLink {
                    url: resolve_url(&base, href),
                    label: text_of(a),
                })
            })
            .filter(|link| seen.insert(link.url.clone()))
            .collect())
    }

    /// Next listing page, or `None` when absent or wrapping around to page 0.
    pub fn next_page(&self, html: &str, base_url: &str) -> Result<Option<String>> {
        let base = Url::parse(base_url)?;
        let document = Html::parse_document(html);

        let next = document
            .select(&self.next)
            .find_map(|a| a.value().attr("href"))
            .map(|href| resolve_url(&base, href));

        Ok(next.filter(|url| page_index(url, &self.page_index) != Some(0)))
    }
}
