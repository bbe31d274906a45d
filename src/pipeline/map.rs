// src/pipeline/map.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{CategoryNode, Config};
use crate::services::{CategoryDiscovery, PageFetcher};
use crate::utils::log;

/// Discover the category trees, one per country group. Returns the forest
/// stored in `categories.json`.
pub async fn run_mapper(
    config: &Config,
    fetcher: Arc<dyn PageFetcher>,
    token: &CancellationToken,
) -> Result<Vec<CategoryNode>> {
    log::header("Discovering categories");

    let discovery = CategoryDiscovery::new(fetcher, &config.site, &config.crawler)?;
    discovery.discover(token).await
}
