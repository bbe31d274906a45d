//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SiteSelectors;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Where proxies come from
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// On-disk response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Target site layout
    #[serde(default)]
    pub site: SiteConfig,

    /// Minute / total / differential range expressions
    #[serde(default)]
    pub filter: FilterConfig,

    /// Summary settings for the report
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.category_workers == 0 || self.crawler.match_workers == 0 {
            return Err(AppError::validation("crawler worker pools must be > 0"));
        }
        if self.crawler.discovery_workers == 0 {
            return Err(AppError::validation(
                "crawler.discovery_workers must be > 0",
            ));
        }
        if self.proxy.poll_interval_ms == 0 {
            return Err(AppError::validation("proxy.poll_interval_ms must be > 0"));
        }
        match self.proxy.source {
            ProxySourceKind::List if self.proxy.addresses.is_empty() => {
                return Err(AppError::validation("proxy.addresses is empty"));
            }
            ProxySourceKind::File if self.proxy.path.is_none() => {
                return Err(AppError::validation("proxy.path is required for file source"));
            }
            ProxySourceKind::Url if self.proxy.url.is_none() => {
                return Err(AppError::validation("proxy.url is required for url source"));
            }
            _ => {}
        }
        if self.filter.separator.is_empty() {
            return Err(AppError::validation("filter.separator is empty"));
        }
        url::Url::parse(&self.site.base_url)?;
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Pause after each listing page fetch in milliseconds
    #[serde(default = "defaults::listing_delay")]
    pub listing_delay_ms: u64,

    /// Concurrent category (listing) tasks
    #[serde(default = "defaults::category_workers")]
    pub category_workers: usize,

    /// Concurrent match page tasks
    #[serde(default = "defaults::match_workers")]
    pub match_workers: usize,

    /// Concurrent requests during category tree discovery
    #[serde(default = "defaults::discovery_workers")]
    pub discovery_workers: usize,

    /// Upper bound on waiting for a pool to drain
    #[serde(default = "defaults::drain_ceiling")]
    pub drain_ceiling_secs: u64,

    /// Body substrings that mark an anti-bot page
    #[serde(default = "defaults::block_markers")]
    pub block_markers: Vec<String>,

    /// Link labels that mark a postponed or cancelled match
    #[serde(default = "defaults::postponed_markers")]
    pub postponed_markers: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            listing_delay_ms: defaults::listing_delay(),
            category_workers: defaults::category_workers(),
            match_workers: defaults::match_workers(),
            discovery_workers: defaults::discovery_workers(),
            drain_ceiling_secs: defaults::drain_ceiling(),
            block_markers: defaults::block_markers(),
            postponed_markers: defaults::postponed_markers(),
        }
    }
}

/// Kind of external proxy list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxySourceKind {
    /// Inline `addresses`
    #[default]
    List,
    /// One address per line in `path`
    File,
    /// Text list downloaded from `url`
    Url,
}

/// Proxy pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub source: ProxySourceKind,

    /// `host:port` or `user:pass@host:port`
    #[serde(default)]
    pub addresses: Vec<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    /// Sleep between reload attempts while the pool is empty
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            source: ProxySourceKind::default(),
            addresses: Vec::new(),
            path: None,
            url: None,
            poll_interval_ms: defaults::poll_interval(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::cache_dir")]
    pub dir: String,

    /// Entries older than this are refetched
    #[serde(default = "defaults::cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: defaults::cache_dir(),
            ttl_secs: defaults::cache_ttl(),
        }
    }
}

/// Target site entry points and page selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Countries listing page, relative to `base_url`
    #[serde(default = "defaults::countries_path")]
    pub countries_path: String,

    /// Per-country competitions resource; `{id}` is the country id
    #[serde(default = "defaults::competitions_path")]
    pub competitions_path: String,

    /// Extra headers sent with the competitions request
    #[serde(default = "defaults::competitions_headers")]
    pub competitions_headers: BTreeMap<String, String>,

    /// Appended to every season URL to reach its results listing
    #[serde(default = "defaults::results_suffix")]
    pub results_suffix: String,

    #[serde(default)]
    pub selectors: SiteSelectors,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            countries_path: defaults::countries_path(),
            competitions_path: defaults::competitions_path(),
            competitions_headers: defaults::competitions_headers(),
            results_suffix: defaults::results_suffix(),
            selectors: SiteSelectors::default(),
        }
    }
}

/// Range expressions applied to parsed matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Splits a range expression into tokens
    #[serde(default = "defaults::separator")]
    pub separator: String,

    /// e.g. "1-15, 45+, 90+"
    #[serde(default)]
    pub minutes: String,

    /// e.g. "0-1, 2, 3-10"
    #[serde(default)]
    pub totals: String,

    #[serde(default)]
    pub differentials: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            separator: defaults::separator(),
            minutes: String::new(),
            totals: String::new(),
            differentials: String::new(),
        }
    }
}

/// Which score figure the report buckets on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    #[default]
    Total,
    Differential,
}

/// Whether summary counts use half-time or full-time scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    HalfTime,
    #[default]
    FullTime,
}

impl Horizon {
    /// Minute that closes the period: 45 or 90.
    pub fn boundary_minute(self) -> u32 {
        match self {
            Self::HalfTime => 45,
            Self::FullTime => 90,
        }
    }
}

/// Share of boundary-minute matches dropped from a summary count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimPolicy {
    #[default]
    None,
    /// Half, rounded up
    Half,
    All,
}

impl TrimPolicy {
    /// How many of `count` matches to remove.
    pub fn removal_count(self, count: usize) -> usize {
        match self {
            Self::None => 0,
            Self::Half => count.div_ceil(2),
            Self::All => count,
        }
    }
}

/// Report summary settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub metric: ScoreMetric,

    #[serde(default)]
    pub horizon: Horizon,

    /// Trim for goals at minute 45, used with the half-time horizon
    #[serde(default)]
    pub half_time_trim: TrimPolicy,

    /// Trim for goals at minute 90, used with the full-time horizon
    #[serde(default)]
    pub full_time_trim: TrimPolicy,
}

impl ReportConfig {
    /// Trim policy of the active horizon.
    pub fn trim(&self) -> TrimPolicy {
        match self.horizon {
            Horizon::HalfTime => self.half_time_trim,
            Horizon::FullTime => self.full_time_trim,
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0".into()
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn listing_delay() -> u64 {
        1000
    }
    pub fn category_workers() -> usize {
        8
    }
    pub fn match_workers() -> usize {
        8
    }
    pub fn discovery_workers() -> usize {
        64
    }
    pub fn drain_ceiling() -> u64 {
        24 * 60 * 60
    }
    pub fn block_markers() -> Vec<String> {
        vec!["Are you human?".into()]
    }
    pub fn postponed_markers() -> Vec<String> {
        vec!["P-P".into()]
    }

    // Proxy defaults
    pub fn poll_interval() -> u64 {
        5000
    }

    // Cache defaults
    pub fn cache_dir() -> String {
        "cache".into()
    }
    pub fn cache_ttl() -> u64 {
        6 * 60 * 60
    }

    // Site defaults
    pub fn base_url() -> String {
        "https://www.futbol24.com/".into()
    }
    pub fn countries_path() -> String {
        String::new()
    }
    pub fn competitions_path() -> String {
        "ml/subLeagues/?CountryId={id}".into()
    }
    pub fn competitions_headers() -> std::collections::BTreeMap<String, String> {
        std::collections::BTreeMap::from([("X-Requested-With".to_string(), "XMLHttpRequest".to_string())])
    }
    pub fn results_suffix() -> String {
        "results/".into()
    }

    // Filter defaults
    pub fn separator() -> String {
        ",".into()
    }
}
