// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod category;
mod config;
mod fixture;
mod proxy;
mod report;
mod selectors;

// Re-export all public types
pub use category::{CategoryNode, CategoryPath, LeafCategory, select_leaves};
pub use config::{
    CacheConfig, Config, CrawlerConfig, FilterConfig, Horizon, ProxyConfig, ProxySourceKind,
    ReportConfig, ScoreMetric, SiteConfig, TrimPolicy,
};
pub use fixture::{
    Goal, GoalKind, Match, MatchBuilder, NoInfoEntry, NoInfoReason, Score, primary_minute,
};
pub use proxy::ProxyEntry;
pub use report::{RangeBlock, ReportRow, header_cells};
pub use selectors::{CountryGroup, SiteSelectors};
