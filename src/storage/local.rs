//! Local filesystem storage implementation.
//!
//! Every file is written to a temp sibling first and renamed into place, so
//! an interrupted run never leaves a half-written artefact behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CategoryNode, Match, NoInfoEntry, ReportRow};
use crate::storage::{ReportData, ResultStorage, Snapshot, WriteMetadata};

const CATEGORIES: &str = "categories.json";
const MATCHES: &str = "matches.json";
const NO_INFO: &str = "no_info.json";
const REPORT_JSON: &str = "report.json";
const REPORT_TSV: &str = "report.tsv";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Does an artefact exist?
    pub fn exists(&self, key: &str) -> bool {
        self.path(key).exists()
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn read_items<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.read_json::<Snapshot<T>>(key).await? {
            Some(snapshot) => Ok(snapshot.items),
            None => {
                log::warn!("No {} found", key);
                Ok(Vec::new())
            }
        }
    }

    /// Keep stored items whose URL is not in `fresh`, then append `fresh`.
    async fn merge_by_url<T, F>(
        &self,
        key: &str,
        fresh: &[T],
        moved: &[&str],
        url_of: F,
        status: &str,
    ) -> Result<WriteMetadata>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync,
        F: Fn(&T) -> &str + Send + Sync,
    {
        let mut replaced: HashSet<&str> = fresh.iter().map(&url_of).collect();
        replaced.extend(moved.iter().copied());
        let mut items: Vec<T> = self
            .read_json::<Snapshot<T>>(key)
            .await?
            .map(|s| s.items)
            .unwrap_or_default();
        items.retain(|item| !replaced.contains(url_of(item)));
        items.extend(fresh.iter().cloned());

        let snapshot = Snapshot::new(items, Some(status.to_string()));
        self.write_json(key, &snapshot).await?;
        log::info!("{} items written to {}", snapshot.count, key);

        Ok(WriteMetadata {
            count: snapshot.count,
            written: fresh.len(),
            location: self.path(key).display().to_string(),
            timestamp: snapshot.updated_at,
        })
    }
}

/// Tab-separated rendering of a report; tabs and newlines in cells become spaces.
pub fn render_tsv(header: &[String], rows: &[ReportRow]) -> String {
    fn line(cells: &[String]) -> String {
        cells
            .iter()
            .map(|c| c.replace(['\t', '\n', '\r'], " "))
            .collect::<Vec<_>>()
            .join("\t")
    }

    let mut out = line(header);
    out.push('\n');
    for row in rows {
        out.push_str(&line(&row.cells()));
        out.push('\n');
    }
    out
}

#[async_trait]
impl ResultStorage for LocalStorage {
    async fn save_categories(&self, roots: &[CategoryNode]) -> Result<WriteMetadata> {
        self.write_json(CATEGORIES, roots).await?;
        let leaves: usize = roots.iter().map(CategoryNode::leaf_count).sum();
        Ok(WriteMetadata {
            count: leaves,
            written: leaves,
            location: self.path(CATEGORIES).display().to_string(),
            timestamp: Utc::now(),
        })
    }

    async fn load_categories(&self) -> Result<Option<Vec<CategoryNode>>> {
        self.read_json(CATEGORIES).await
    }

    async fn save_crawl(
        &self,
        matches: &[Match],
        no_info: &[NoInfoEntry],
        status: &str,
    ) -> Result<(WriteMetadata, WriteMetadata)> {
        // A URL lives in exactly one of the two snapshots.
        let match_urls: Vec<&str> = matches.iter().map(|m| m.url.as_str()).collect();
        let no_info_urls: Vec<&str> = no_info.iter().map(|e| e.url.as_str()).collect();

        let stored_matches = self
            .merge_by_url(MATCHES, matches, &no_info_urls, |m: &Match| m.url.as_str(), status)
            .await?;
        let stored_no_info = self
            .merge_by_url(NO_INFO, no_info, &match_urls, |e: &NoInfoEntry| e.url.as_str(), status)
            .await?;
        Ok((stored_matches, stored_no_info))
    }

    async fn load_matches(&self) -> Result<Vec<Match>> {
        self.read_items(MATCHES).await
    }

    async fn load_no_info(&self) -> Result<Vec<NoInfoEntry>> {
        self.read_items(NO_INFO).await
    }

    async fn save_report(&self, header: &[String], rows: &[ReportRow]) -> Result<WriteMetadata> {
        let data = ReportData {
            generated_at: Utc::now(),
            header: header.to_vec(),
            rows: rows.to_vec(),
        };
        self.write_json(REPORT_JSON, &data).await?;
        self.write_bytes(REPORT_TSV, render_tsv(header, rows).as_bytes())
            .await?;

        Ok(WriteMetadata {
            count: rows.len(),
            written: rows.len(),
            location: self.path(REPORT_TSV).display().to_string(),
            timestamp: data.generated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use crate::models::{CategoryPath, MatchBuilder, NoInfoReason, RangeBlock, Score};

    fn game(url: &str, full_time: Score) -> Match {
        let date = NaiveDate::from_ymd_opt(2024, 2, 17)
            .and_then(|d| d.and_hms_opt(16, 0, 0))
            .unwrap();
        MatchBuilder::new(
            date,
            "Lyon",
            "Nantes",
            CategoryPath::from(vec!["National", "France", "Ligue 1", "2023/2024"]),
            1,
            url,
        )
        .full_time(Some(full_time))
        .build()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!storage.exists("test.tmp"));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(storage.load_categories().await.unwrap().is_none());
        assert!(storage.load_matches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_categories_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let roots = vec![CategoryNode::branch(
            "National",
            vec![CategoryNode::branch(
                "France",
                vec![CategoryNode::branch(
                    "Ligue 1",
                    vec![CategoryNode::leaf("2023/2024", "https://example.com/l1/results/")],
                )],
            )],
        )];

        let meta = storage.save_categories(&roots).await.unwrap();
        assert_eq!(meta.count, 1);

        let loaded = storage.load_categories().await.unwrap().unwrap();
        assert_eq!(loaded[0].leaf_count(), 1);
        assert_eq!(loaded[0].children[0].label, "France");
    }

    #[tokio::test]
    async fn test_save_crawl_merges_by_url() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .save_crawl(
                &[game("https://example.com/1", Score::new(1, 0)), game("https://example.com/2", Score::new(0, 0))],
                &[],
                "completed",
            )
            .await
            .unwrap();

        let no_info = NoInfoEntry {
            path: CategoryPath::from(vec!["National", "France", "Ligue 1", "2023/2024"]),
            order: 1,
            url: "https://example.com/3".to_string(),
            reason: NoInfoReason::Postponed,
        };
        let (matches, missing) = storage
            .save_crawl(&[game("https://example.com/2", Score::new(2, 2))], &[no_info], "interrupted")
            .await
            .unwrap();
        assert_eq!(matches.count, 2);
        assert_eq!(matches.written, 1);
        assert_eq!(missing.count, 1);

        let loaded = storage.load_matches().await.unwrap();
        assert_eq!(loaded.len(), 2);
        let second = loaded.iter().find(|m| m.url == "https://example.com/2").unwrap();
        assert_eq!(second.full_time, Score::new(2, 2));
        assert_eq!(storage.load_no_info().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_result_moves_between_matches_and_no_info() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let url = "https://example.com/1";
        let postponed = NoInfoEntry {
            path: CategoryPath::from(vec!["National", "France", "Ligue 1", "2023/2024"]),
            order: 1,
            url: url.to_string(),
            reason: NoInfoReason::Postponed,
        };

        storage
            .save_crawl(&[], &[postponed.clone()], "completed")
            .await
            .unwrap();
        let (matches, missing) = storage
            .save_crawl(&[game(url, Score::new(1, 0))], &[], "completed")
            .await
            .unwrap();
        assert_eq!(matches.count, 1);
        assert_eq!(missing.count, 0);
        assert!(storage.load_no_info().await.unwrap().is_empty());

        storage
            .save_crawl(&[], &[postponed], "completed")
            .await
            .unwrap();
        assert!(storage.load_matches().await.unwrap().is_empty());
        assert_eq!(storage.load_no_info().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_report_writes_tsv() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let header = vec!["Country".to_string(), "No information".to_string()];
        let rows = vec![ReportRow {
            country: "France".to_string(),
            league: "Ligue 1".to_string(),
            season: "2023/2024".to_string(),
            blocks: vec![RangeBlock {
                token: "0-1".to_string(),
                bucket_counts: vec![2],
                summary: 1,
            }],
            no_info: 0,
        }];

        storage.save_report(&header, &rows).await.unwrap();

        let tsv = tokio::fs::read_to_string(tmp.path().join("report.tsv"))
            .await
            .unwrap();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines[0], "Country\tNo information");
        assert_eq!(lines[1], "France\tLigue 1\t2023/2024\t2\t1\t0");
        assert!(storage.exists("report.json"));
    }
}
