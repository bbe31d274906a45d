// src/services/proxy.rs

//! Proxy pool service.
//!
//! Holds the candidate proxies shared by every fetch worker. The pool is
//! filled lazily from a [`ProxySource`]; entries are only ever removed, and a
//! removed address is never admitted again for the lifetime of the pool.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, ProxyConfig, ProxyEntry, ProxySourceKind};
use crate::utils::http::create_async_client;

/// External supplier of proxy addresses.
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn load(&self) -> Result<Vec<ProxyEntry>>;
}

/// Fixed list of addresses from the configuration.
pub struct StaticSource {
    entries: Vec<ProxyEntry>,
}

impl StaticSource {
    pub fn new(entries: Vec<ProxyEntry>) -> Self {
        Self { entries }
    }

    pub fn parse(addresses: &[String]) -> Result<Self> {
        let entries = addresses
            .iter()
            .map(|a| ProxyEntry::parse(a))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(entries))
    }
}

#[async_trait]
impl ProxySource for StaticSource {
    async fn load(&self) -> Result<Vec<ProxyEntry>> {
        Ok(self.entries.clone())
    }
}

/// One address per line in a local file, re-read on every load.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProxySource for FileSource {
    async fn load(&self) -> Result<Vec<ProxyEntry>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_proxy_list(&content))
    }
}

/// Plain-text or HTML proxy list served over HTTP.
pub struct UrlSource {
    url: String,
    client: reqwest::Client,
}

impl UrlSource {
    pub fn new(url: impl Into<String>, crawler: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            client: create_async_client(crawler, None)?,
        })
    }
}

#[async_trait]
impl ProxySource for UrlSource {
    async fn load(&self) -> Result<Vec<ProxyEntry>> {
        let text = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_proxy_list(&text))
    }
}

/// Extract proxies from a list, one per line, falling back to `ip:port` scanning.
pub fn parse_proxy_list(text: &str) -> Vec<ProxyEntry> {
    let mut entries: Vec<ProxyEntry> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| ProxyEntry::parse(line).ok())
        .collect();

    if entries.is_empty() {
        if let Ok(pattern) = Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3}:\d{1,5})\b") {
            entries = pattern
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .filter_map(|m| ProxyEntry::parse(m.as_str()).ok())
                .collect();
        }
    }

    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert(e.address.clone()));
    entries
}

/// Build the configured proxy source.
pub fn source_from_config(
    proxy: &ProxyConfig,
    crawler: &CrawlerConfig,
) -> Result<Box<dyn ProxySource>> {
    Ok(match proxy.source {
        ProxySourceKind::List => Box::new(StaticSource::parse(&proxy.addresses)?),
        ProxySourceKind::File => {
            let path = proxy
                .path
                .as_ref()
                .ok_or_else(|| AppError::config("proxy.path is not set"))?;
            Box::new(FileSource::new(path))
        }
        ProxySourceKind::Url => {
            let url = proxy
                .url
                .as_ref()
                .ok_or_else(|| AppError::config("proxy.url is not set"))?;
            Box::new(UrlSource::new(url, crawler)?)
        }
    })
}

#[derive(Default)]
struct PoolState {
    entries: Vec<ProxyEntry>,
    removed: HashSet<String>,
}

/// Thread-safe set of live proxies.
pub struct ProxyPool {
    source: Box<dyn ProxySource>,
    state: Mutex<PoolState>,
    reload: tokio::sync::Mutex<()>,
    poll_interval: Duration,
}

impl ProxyPool {
    pub fn new(source: Box<dyn ProxySource>, poll_interval: Duration) -> Self {
        Self {
            source,
            state: Mutex::new(PoolState::default()),
            reload: tokio::sync::Mutex::new(()),
            poll_interval,
        }
    }

    pub fn from_config(proxy: &ProxyConfig, crawler: &CrawlerConfig) -> Result<Self> {
        Ok(Self::new(
            source_from_config(proxy, crawler)?,
            Duration::from_millis(proxy.poll_interval_ms),
        ))
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        // A panic while holding the lock cannot leave the sets half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until at least one proxy is available, reloading from the source
    /// with a backoff sleep between attempts.
    pub async fn ensure_loaded(&self, token: &CancellationToken) -> Result<()> {
        loop {
            if token.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            if !self.is_empty() {
                return Ok(());
            }

            let _guard = tokio::select! {
                guard = self.reload.lock() => guard,
                _ = token.cancelled() => return Err(AppError::Cancelled),
            };

            // Another caller may have refilled the pool while we waited.
            if !self.is_empty() {
                return Ok(());
            }

            let loaded = tokio::select! {
                result = self.source.load() => result,
                _ = token.cancelled() => return Err(AppError::Cancelled),
            };
            match loaded {
                Ok(entries) => {
                    let added = self.admit(entries);
                    if added > 0 {
                        log::info!("Proxy pool loaded {} proxies", added);
                        return Ok(());
                    }
                    log::warn!("Proxy source returned no usable proxies");
                }
                Err(e) => log::warn!("Failed to load proxies: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = token.cancelled() => return Err(AppError::Cancelled),
            }
        }
    }

    /// Add entries that are neither present nor previously removed.
    fn admit(&self, entries: Vec<ProxyEntry>) -> usize {
        let mut state = self.state();
        let mut added = 0;
        for entry in entries {
            if state.removed.contains(&entry.address)
                || state.entries.iter().any(|e| e.address == entry.address)
            {
                continue;
            }
            state.entries.push(entry);
            added += 1;
        }
        added
    }

    /// Uniform random choice among current entries.
    pub fn pick(&self) -> Option<ProxyEntry> {
        let state = self.state();
        if state.entries.is_empty() {
            return None;
        }
        let index = rand::random_range(0..state.entries.len());
        state.entries.get(index).cloned()
    }

    /// Evict a proxy. Returns `true` only for the call that actually removed it.
    pub fn remove(&self, proxy: &ProxyEntry) -> bool {
        let mut state = self.state();
        state.removed.insert(proxy.address.clone());
        let before = state.entries.len();
        state.entries.retain(|e| e.address != proxy.address);
        let removed = state.entries.len() < before;
        if removed {
            log::debug!(
                "Evicted proxy {} ({} left)",
                proxy.address,
                state.entries.len()
            );
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entries(n: usize) -> Vec<ProxyEntry> {
        (0..n)
            .map(|i| ProxyEntry::parse(&format!("10.0.0.{}:8080", i + 1)).unwrap())
            .collect()
    }

    struct CountingSource {
        calls: AtomicUsize,
        entries: Vec<ProxyEntry>,
    }

    #[async_trait]
    impl ProxySource for CountingSource {
        async fn load(&self) -> Result<Vec<ProxyEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.clone())
        }
    }

    #[tokio::test]
    async fn test_lazy_load_and_pick() {
        let pool = ProxyPool::new(
            Box::new(StaticSource::new(entries(3))),
            Duration::from_millis(10),
        );
        assert!(pool.is_empty());
        assert!(pool.pick().is_none());

        pool.ensure_loaded(&CancellationToken::new()).await.unwrap();
        assert_eq!(pool.len(), 3);
        assert!(pool.pick().is_some());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_and_never_readmits() {
        let pool = ProxyPool::new(
            Box::new(StaticSource::new(entries(2))),
            Duration::from_millis(10),
        );
        let token = CancellationToken::new();
        pool.ensure_loaded(&token).await.unwrap();

        let first = entries(1).remove(0);
        assert!(pool.remove(&first));
        assert!(!pool.remove(&first));
        assert_eq!(pool.len(), 1);

        let second = entries(2).remove(1);
        assert!(pool.remove(&second));
        assert!(pool.is_empty());

        // The source only offers evicted proxies, so the pool keeps waiting.
        let waiting = tokio::time::timeout(Duration::from_millis(100), pool.ensure_loaded(&token));
        assert!(waiting.await.is_err());
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_loaded_is_cancellable() {
        let pool = ProxyPool::new(
            Box::new(StaticSource::new(Vec::new())),
            Duration::from_secs(60),
        );
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move { pool.ensure_loaded(&child).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_one_reload() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            entries: entries(4),
        };
        let pool = Arc::new(ProxyPool::new(Box::new(source), Duration::from_millis(10)));
        let token = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            let token = token.clone();
            handles.push(tokio::spawn(async move { pool.ensure_loaded(&token).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn test_parse_proxy_list_lines_and_html() {
        let list = parse_proxy_list("# comment\n10.0.0.1:80\n\nuser:pw@10.0.0.2:81\n10.0.0.1:80\n");
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].username.as_deref(), Some("user"));

        let html = parse_proxy_list("<td>1.2.3.4:3128</td><td>5.6.7.8:8080</td>");
        assert_eq!(html.len(), 2);
    }
}
