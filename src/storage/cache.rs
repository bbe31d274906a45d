//! On-disk page cache.
//!
//! Entries are keyed by a SHA-256 digest of the normalized URL plus the
//! request headers, so repeated runs can skip unchanged pages.
//!
//! ## Layout
//!
//! ```text
//! {dir}/
//! └── ab/
//!     └── ab34…ef.html
//! ```

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::CacheConfig;
use crate::utils::url::normalize;

/// Best-effort response cache; concurrent writers to one key resolve last-writer-wins.
#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
    ttl: Option<Duration>,
    enabled: bool,
}

impl PageCache {
    /// Create a cache rooted at `dir`; a zero TTL keeps entries forever.
    pub fn new(dir: impl Into<PathBuf>, ttl_secs: u64, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            enabled,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.dir, config.ttl_secs, config.enabled)
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new("", 0, false)
    }

    /// Cache key for a URL and header set.
    pub fn key(url: &str, headers: &[(String, String)]) -> String {
        let mut sorted: Vec<&(String, String)> = headers.iter().collect();
        sorted.sort();

        let mut hasher = Sha256::new();
        hasher.update(normalize(url).as_bytes());
        for (name, value) in sorted {
            hasher.update(b"\n");
            hasher.update(name.to_ascii_lowercase().as_bytes());
            hasher.update(b":");
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(&key[..2]).join(format!("{key}.html"))
    }

    /// Read a fresh entry, if any.
    pub async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }
        let path = self.path(&Self::key(url, headers));

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        if let (Some(ttl), Ok(modified)) = (self.ttl, metadata.modified()) {
            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or_default();
            if age > ttl {
                log::debug!("Cache entry for {} expired", url);
                return Ok(None);
            }
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Store a body (write to a unique temp file, then rename).
    pub async fn put(&self, url: &str, headers: &[(String, String)], body: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let key = Self::key(url, headers);
        let path = self.path(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension(format!("{:016x}.tmp", rand::random::<u64>()));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Remove an entry; missing entries are fine.
    pub async fn invalidate(&self, url: &str, headers: &[(String, String)]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match tokio::fs::remove_file(self.path(&Self::key(url, headers))).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}
