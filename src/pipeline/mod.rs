//! Pipeline entry points for crawler operations.
//!
//! - `run_mapper`: Discover the category tree from the results site
//! - `run_crawler`: Crawl matches below selected categories
//! - `run_report`: Aggregate stored matches into report rows

pub mod crawl;
#[cfg(feature = "map")]
pub mod map;
pub mod orchestrator;
pub mod report;

pub use crawl::run_crawler;
#[cfg(feature = "map")]
pub use map::run_mapper;
pub use orchestrator::{
    CrawlEvent, CrawlOrchestrator, CrawlStatus, CrawlSummary, NoInfoLedger, TaskContext, TaskPool,
};
pub use report::run_report;
