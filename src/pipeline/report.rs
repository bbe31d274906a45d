// src/pipeline/report.rs

use crate::engine::{MatchFilter, build_report};
use crate::error::Result;
use crate::models::{Config, ReportRow, header_cells};
use crate::storage::ResultStorage;
use crate::utils::log;

/// Build report rows from stored results and save them.
pub async fn run_report(config: &Config, storage: &dyn ResultStorage) -> Result<Vec<ReportRow>> {
    log::header("Building report");

    let matches = storage.load_matches().await?;
    let no_info = storage.load_no_info().await?;
    log::sub_item(&format!(
        "Loaded {} matches and {} no-information entries",
        matches.len(),
        no_info.len()
    ));

    let filter = MatchFilter::from_config(&config.filter);
    let rows = build_report(&matches, &no_info, &filter, config.report);
    let header = header_cells(filter.range_tokens(config.report.metric), filter.minute_tokens());

    let written = storage.save_report(&header, &rows).await?;
    log::summary(
        "Report",
        &[
            ("Rows", rows.len().to_string()),
            (
                "Passing filter",
                filter.apply(&matches, config.report.metric).len().to_string(),
            ),
            ("Location", written.location),
        ],
    );

    Ok(rows)
}
