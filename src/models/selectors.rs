// src/models/selectors.rs

//! CSS selectors and patterns describing the results site.

use serde::{Deserialize, Serialize};

/// A top-level group of countries on the front page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryGroup {
    /// Tree label of the group node
    pub label: String,

    /// Country links belonging to the group
    pub selector: String,
}

impl CountryGroup {
    pub fn new(label: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            selector: selector.into(),
        }
    }
}

/// CSS selectors for scraping category, listing and match pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSelectors {
    /// Country groups on the front page, in tree order
    #[serde(default = "defaults::country_groups")]
    pub country_groups: Vec<CountryGroup>,

    /// Attribute holding a country's numeric id, read from the link or its parent
    #[serde(default = "defaults::country_id_attr")]
    pub country_id_attr: String,

    /// League links in the per-country competitions resource
    #[serde(default = "defaults::competition_link")]
    pub competition_link: String,

    /// Season selector options on a league page
    #[serde(default = "defaults::season_option")]
    pub season_option: String,

    /// Match detail links on a listing page
    #[serde(default = "defaults::listing_link")]
    pub listing_link: String,

    /// "Next page" link on a listing page
    #[serde(default = "defaults::next_page")]
    pub next_page: String,

    /// Regex capturing the page index from a listing URL
    #[serde(default = "defaults::page_index_pattern")]
    pub page_index_pattern: String,

    #[serde(default = "defaults::match_date")]
    pub match_date: String,

    /// chrono format of the match date text
    #[serde(default = "defaults::date_format")]
    pub date_format: String,

    #[serde(default = "defaults::home_team")]
    pub home_team: String,

    #[serde(default = "defaults::guest_team")]
    pub guest_team: String,

    /// Displayed final score
    #[serde(default = "defaults::final_score")]
    pub final_score: String,

    /// Rows of the event table
    #[serde(default = "defaults::event_row")]
    pub event_row: String,

    /// Regex capturing the event type code from a row class
    #[serde(default = "defaults::event_code_pattern")]
    pub event_code_pattern: String,

    /// Row class fragment for a home-side action, matched case-insensitively
    #[serde(default = "defaults::home_marker")]
    pub home_marker: String,

    /// Row class fragment for a guest-side action
    #[serde(default = "defaults::guest_marker")]
    pub guest_marker: String,

    #[serde(default = "defaults::minute_cell")]
    pub minute_cell: String,

    #[serde(default = "defaults::score_cell")]
    pub score_cell: String,

    #[serde(default = "defaults::home_cell")]
    pub home_cell: String,

    #[serde(default = "defaults::guest_cell")]
    pub guest_cell: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            country_groups: defaults::country_groups(),
            country_id_attr: defaults::country_id_attr(),
            competition_link: defaults::competition_link(),
            season_option: defaults::season_option(),
            listing_link: defaults::listing_link(),
            next_page: defaults::next_page(),
            page_index_pattern: defaults::page_index_pattern(),
            match_date: defaults::match_date(),
            date_format: defaults::date_format(),
            home_team: defaults::home_team(),
            guest_team: defaults::guest_team(),
            final_score: defaults::final_score(),
            event_row: defaults::event_row(),
            event_code_pattern: defaults::event_code_pattern(),
            home_marker: defaults::home_marker(),
            guest_marker: defaults::guest_marker(),
            minute_cell: defaults::minute_cell(),
            score_cell: defaults::score_cell(),
            home_cell: defaults::home_cell(),
            guest_cell: defaults::guest_cell(),
        }
    }
}

mod defaults {
    use super::CountryGroup;

    pub fn country_groups() -> Vec<CountryGroup> {
        vec![
            CountryGroup::new("International", "div.international ul.countries > li > a"),
            CountryGroup::new("National", "div.national ul.countries > li > a"),
        ]
    }
    pub fn country_id_attr() -> String {
        "data-id".into()
    }
    pub fn competition_link() -> String {
        "ul > li > a".into()
    }
    pub fn season_option() -> String {
        "div.desc select.gray2.onchangeurl option".into()
    }
    pub fn listing_link() -> String {
        "table.stat2.stat > tbody > tr a.matchAction".into()
    }
    pub fn next_page() -> String {
        "div.next > a".into()
    }
    pub fn page_index_pattern() -> String {
        r"(?i)statLR-Page=(\d+)".into()
    }
    pub fn match_date() -> String {
        "span.date.timezone".into()
    }
    pub fn date_format() -> String {
        "%d/%m/%Y %H:%M".into()
    }
    pub fn home_team() -> String {
        "thead > tr > td.home".into()
    }
    pub fn guest_team() -> String {
        "thead > tr > td.guest".into()
    }
    pub fn final_score() -> String {
        "td.result span.result1".into()
    }
    pub fn event_row() -> String {
        "tbody > tr".into()
    }
    pub fn event_code_pattern() -> String {
        r"(?i)[gh]action([1-6])".into()
    }
    pub fn home_marker() -> String {
        "haction".into()
    }
    pub fn guest_marker() -> String {
        "gaction".into()
    }
    pub fn minute_cell() -> String {
        "td.status".into()
    }
    pub fn score_cell() -> String {
        "td.result".into()
    }
    pub fn home_cell() -> String {
        "td.home".into()
    }
    pub fn guest_cell() -> String {
        "td.guest".into()
    }
}
