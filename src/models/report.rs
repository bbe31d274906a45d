// src/models/report.rs

//! Report rows handed to the spreadsheet writer.

use serde::{Deserialize, Serialize};

/// Counts for one configured range token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBlock {
    pub token: String,

    /// One count per configured minute bucket, in configuration order
    pub bucket_counts: Vec<usize>,

    pub summary: usize,
}

/// One category group of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub country: String,
    pub league: String,
    pub season: String,
    pub blocks: Vec<RangeBlock>,
    pub no_info: usize,
}

impl ReportRow {
    /// Flatten into spreadsheet cells: labels, each block's buckets and summary, no-info count.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = vec![
            self.country.clone(),
            self.league.clone(),
            self.season.clone(),
        ];
        for block in &self.blocks {
            cells.extend(block.bucket_counts.iter().map(usize::to_string));
            cells.push(block.summary.to_string());
        }
        cells.push(self.no_info.to_string());
        cells
    }
}

/// Header cells matching [`ReportRow::cells`].
pub fn header_cells(range_tokens: &[String], minute_tokens: &[String]) -> Vec<String> {
    let mut cells = vec![
        "Country".to_string(),
        "League".to_string(),
        "Season".to_string(),
    ];
    for range in range_tokens {
        cells.extend(minute_tokens.iter().map(|m| format!("{range} @ {m}")));
        cells.push(format!("{range} summary"));
    }
    cells.push("No information".to_string());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_layout() {
        let row = ReportRow {
            country: "England".to_string(),
            league: "Premier League".to_string(),
            season: "2023/2024".to_string(),
            blocks: vec![RangeBlock {
                token: "0-1".to_string(),
                bucket_counts: vec![3, 1],
                summary: 2,
            }],
            no_info: 4,
        };
        assert_eq!(
            row.cells(),
            vec!["England", "Premier League", "2023/2024", "3", "1", "2", "4"]
        );
        let header = header_cells(&["0-1".to_string()], &["1-15".to_string(), "90+".to_string()]);
        assert_eq!(header.len(), row.cells().len());
    }
}
