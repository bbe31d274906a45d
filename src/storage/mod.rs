//! Storage for crawl artefacts.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── categories.json       # Discovered category tree
//! ├── matches.json          # Parsed matches (merged across runs by URL)
//! ├── no_info.json          # URLs without usable event data
//! ├── report.json           # Last report rows
//! └── report.tsv            # Same rows, tab separated
//! ```
//!
//! The page cache lives in its own directory, see [`PageCache`].

pub mod cache;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{CategoryNode, Match, NoInfoEntry, ReportRow};

// Re-export for convenience
pub use cache::PageCache;
pub use local::LocalStorage;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Items in the file after merging
    pub count: usize,
    /// Items replaced or added by this write
    pub written: usize,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

/// A stored list with a header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// ISO 8601 timestamp of last update
    pub updated_at: DateTime<Utc>,
    /// Terminal status of the run that last wrote the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> Snapshot<T> {
    pub fn new(items: Vec<T>, status: Option<String>) -> Self {
        Self {
            updated_at: Utc::now(),
            status,
            count: items.len(),
            items,
        }
    }
}

/// Stored report with its header row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub header: Vec<String>,
    pub rows: Vec<ReportRow>,
}

/// Trait for result storage backends.
#[async_trait]
pub trait ResultStorage: Send + Sync {
    async fn save_categories(&self, roots: &[CategoryNode]) -> Result<WriteMetadata>;

    /// `None` when the tree was never discovered.
    async fn load_categories(&self) -> Result<Option<Vec<CategoryNode>>>;

    /// Merge matches and no-info entries into the stored sets, newer by URL wins.
    async fn save_crawl(
        &self,
        matches: &[Match],
        no_info: &[NoInfoEntry],
        status: &str,
    ) -> Result<(WriteMetadata, WriteMetadata)>;

    async fn load_matches(&self) -> Result<Vec<Match>>;

    async fn load_no_info(&self) -> Result<Vec<NoInfoEntry>>;

    /// Write `report.json` and `report.tsv`.
    async fn save_report(&self, header: &[String], rows: &[ReportRow]) -> Result<WriteMetadata>;
}
