// src/pipeline/crawl.rs

//! Match crawling pipeline.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{CategoryNode, Config, select_leaves};
use crate::pipeline::orchestrator::{CrawlOrchestrator, CrawlStatus, CrawlSummary};
use crate::services::PageFetcher;
use crate::storage::ResultStorage;
use crate::utils::log;

/// Crawl the selected categories and store whatever was found.
///
/// Results are saved even when the run is interrupted or fails; a failed
/// run is reported as an error afterwards.
pub async fn run_crawler(
    config: Arc<Config>,
    storage: &dyn ResultStorage,
    roots: &[CategoryNode],
    selections: &[Vec<String>],
    fetcher: Arc<dyn PageFetcher>,
    token: &CancellationToken,
) -> Result<CrawlSummary> {
    let start_time = Utc::now();
    log::header("Crawling matches");

    let leaves = select_leaves(roots, selections)?;
    if leaves.is_empty() {
        return Err(AppError::validation("selection contains no leaf categories"));
    }
    log::step(1, 2, &format!("Crawling {} leaf categories", leaves.len()));

    let orchestrator = CrawlOrchestrator::new(Arc::clone(&config), fetcher)?;
    let summary = orchestrator.collect(leaves, token).await;

    log::step(2, 2, "Saving results");
    let (matches, no_info) = storage
        .save_crawl(&summary.matches, &summary.no_info, summary.status.label())
        .await?;
    log::sub_item(&format!("Matches: {} ({} stored)", matches.written, matches.count));
    log::sub_item(&format!("No information: {} ({} stored)", no_info.written, no_info.count));

    let elapsed = Utc::now() - start_time;
    log::summary(
        "Crawl Results",
        &[
            ("Status", summary.status.label().to_string()),
            ("Matches", summary.matches.len().to_string()),
            ("No information", summary.no_info.len().to_string()),
            ("Elapsed", format!("{}s", elapsed.num_seconds())),
        ],
    );

    match &summary.status {
        CrawlStatus::Failed(message) => Err(AppError::crawl("crawl run", message)),
        CrawlStatus::Interrupted => {
            ::log::warn!("Crawl interrupted; partial results were saved");
            Ok(summary)
        }
        CrawlStatus::Completed => Ok(summary),
    }
}
