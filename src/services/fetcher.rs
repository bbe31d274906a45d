// src/services/fetcher.rs

//! Resilient page fetcher.
//!
//! Every request goes through a randomly chosen proxy. Transport failures,
//! error statuses and anti-bot pages evict the proxy and retry with another
//! one; the loop only ends with a body or cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlerConfig, ProxyEntry};
use crate::services::ProxyPool;
use crate::storage::PageCache;
use crate::utils::http::create_async_client;

/// Extra request headers as (name, value) pairs.
pub type Headers = [(String, String)];

/// Single HTTP GET through a given proxy.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, proxy: &ProxyEntry, url: &str, headers: &Headers) -> Result<String>;
}

/// Anything that turns a URL into a page body.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, headers: &Headers, token: &CancellationToken)
    -> Result<String>;
}

/// Any non-success status is charged to the proxy that produced it.
fn check_status(status: StatusCode, proxy: &str) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(AppError::transport(proxy, format!("HTTP {status}")))
    }
}

/// reqwest transport keeping one client per proxy address.
pub struct ReqwestTransport {
    config: CrawlerConfig,
    clients: Mutex<HashMap<String, reqwest::Client>>,
}

impl ReqwestTransport {
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, proxy: &ProxyEntry) -> Result<reqwest::Client> {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = clients.get(&proxy.address) {
            return Ok(client.clone());
        }
        let client = create_async_client(&self.config, Some(proxy))
            .map_err(|e| AppError::transport(&proxy.address, e))?;
        clients.insert(proxy.address.clone(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, proxy: &ProxyEntry, url: &str, headers: &Headers) -> Result<String> {
        let client = self.client_for(proxy)?;
        let mut request = client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::transport(&proxy.address, e))?;

        check_status(response.status(), &proxy.address)?;

        response
            .text()
            .await
            .map_err(|e| AppError::transport(&proxy.address, e))
    }
}

/// Fetcher with proxy rotation, unbounded retry and an optional page cache.
pub struct ResilientFetcher {
    pool: Arc<ProxyPool>,
    transport: Box<dyn HttpTransport>,
    cache: PageCache,
    block_markers: Vec<String>,
}

impl ResilientFetcher {
    pub fn new(
        pool: Arc<ProxyPool>,
        transport: Box<dyn HttpTransport>,
        cache: PageCache,
        block_markers: Vec<String>,
    ) -> Self {
        Self {
            pool,
            transport,
            cache,
            block_markers,
        }
    }

    /// Fetcher over the configured proxy source, reqwest transport and cache.
    pub fn from_config(config: &Config) -> Result<Self> {
        let pool = ProxyPool::from_config(&config.proxy, &config.crawler)?;
        Ok(Self::new(
            Arc::new(pool),
            Box::new(ReqwestTransport::new(config.crawler.clone())),
            PageCache::from_config(&config.cache),
            config.crawler.block_markers.clone(),
        ))
    }

    fn is_blocked(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.block_markers
            .iter()
            .any(|marker| !marker.is_empty() && body.contains(&marker.to_lowercase()))
    }

    async fn cached(&self, url: &str, headers: &Headers) -> Option<String> {
        match self.cache.get(url, headers).await {
            Ok(Some(body)) if self.is_blocked(&body) => {
                self.drop_cached(url, headers).await;
                None
            }
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", url, e);
                None
            }
        }
    }

    async fn drop_cached(&self, url: &str, headers: &Headers) {
        if let Err(e) = self.cache.invalidate(url, headers).await {
            log::warn!("Cache invalidation failed for {}: {}", url, e);
        }
    }
}

#[async_trait]
impl PageFetcher for ResilientFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &Headers,
        token: &CancellationToken,
    ) -> Result<String> {
        if token.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if let Some(body) = self.cached(url, headers).await {
            log::debug!("Cache hit for {}", url);
            return Ok(body);
        }

        loop {
            if token.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            self.pool.ensure_loaded(token).await?;
            let Some(proxy) = self.pool.pick() else {
                continue;
            };

            let result = tokio::select! {
                result = self.transport.get(&proxy, url, headers) => result,
                _ = token.cancelled() => return Err(AppError::Cancelled),
            };

            match result {
                Ok(body) if self.is_blocked(&body) => {
                    log::warn!("Blocked response for {} via {}, evicting proxy", url, proxy);
                    self.pool.remove(&proxy);
                    self.drop_cached(url, headers).await;
                }
                Ok(body) => {
                    if let Err(e) = self.cache.put(url, headers, &body).await {
                        log::warn!("Cache write failed for {}: {}", url, e);
                    }
                    return Ok(body);
                }
                Err(e) if e.is_retryable() => {
                    log::debug!("Fetch of {} failed: {}; evicting proxy", url, e);
                    self.pool.remove(&proxy);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::services::StaticSource;

    fn pool_of(n: usize) -> Arc<ProxyPool> {
        let entries = (0..n)
            .map(|i| ProxyEntry::parse(&format!("10.1.0.{}:3128", i + 1)).unwrap())
            .collect();
        Arc::new(ProxyPool::new(
            Box::new(StaticSource::new(entries)),
            Duration::from_millis(10),
        ))
    }

    /// Replays scripted responses; once the script runs out every call fails.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<String>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<String>>, calls: Arc<AtomicUsize>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls,
            }
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(&self, proxy: &ProxyEntry, _url: &str, _headers: &Headers) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::transport(&proxy.address, "connection refused")))
        }
    }

    fn fetcher(
        pool: Arc<ProxyPool>,
        script: Vec<Result<String>>,
        calls: Arc<AtomicUsize>,
        cache: PageCache,
    ) -> ResilientFetcher {
        ResilientFetcher::new(
            pool,
            Box::new(ScriptedTransport::new(script, calls)),
            cache,
            vec!["Are you human?".to_string()],
        )
    }

    #[tokio::test]
    async fn test_transport_failures_evict_one_proxy_each_then_block() {
        let pool = pool_of(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Arc::new(fetcher(
            Arc::clone(&pool),
            Vec::new(),
            Arc::clone(&calls),
            PageCache::disabled(),
        ));
        let token = CancellationToken::new();

        let task = {
            let fetcher = Arc::clone(&fetcher);
            let token = token.clone();
            tokio::spawn(async move { fetcher.fetch("https://example.com/m/1", &[], &token).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!task.is_finished(), "fetch must keep waiting for proxies");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(pool.is_empty());

        token.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_blocked_body_evicts_and_retries() {
        let pool = pool_of(3);
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = fetcher(
            Arc::clone(&pool),
            vec![
                Ok("<html><h1>ARE YOU HUMAN?</h1></html>".to_string()),
                Ok("<html>match</html>".to_string()),
            ],
            Arc::clone(&calls),
            PageCache::disabled(),
        );

        let body = fetcher
            .fetch("https://example.com/m/2", &[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "<html>match</html>");
        assert_eq!(pool.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_error_statuses_are_retryable() {
        assert!(check_status(StatusCode::OK, "10.1.0.1:3128").is_ok());
        for status in [StatusCode::NOT_FOUND, StatusCode::GONE, StatusCode::FORBIDDEN] {
            let err = check_status(status, "10.1.0.1:3128").unwrap_err();
            assert!(err.is_retryable(), "{status} must rotate the proxy");
        }
    }

    #[tokio::test]
    async fn test_not_found_rotates_proxy_instead_of_giving_up() {
        let pool = pool_of(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = fetcher(
            Arc::clone(&pool),
            vec![
                check_status(StatusCode::NOT_FOUND, "10.1.0.1:3128").map(|()| String::new()),
                Ok("<html>match</html>".to_string()),
            ],
            Arc::clone(&calls),
            PageCache::disabled(),
        );

        let body = fetcher
            .fetch("https://example.com/m/4", &[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "<html>match</html>");
        assert_eq!(pool.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path(), 0, true);
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = fetcher(
            pool_of(1),
            vec![Ok("<html>first</html>".to_string())],
            Arc::clone(&calls),
            cache,
        );
        let token = CancellationToken::new();

        let first = fetcher.fetch("https://example.com/m/3", &[], &token).await.unwrap();
        let second = fetcher.fetch("https://example.com/m/3", &[], &token).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = fetcher(pool_of(1), Vec::new(), Arc::clone(&calls), PageCache::disabled());
        let token = CancellationToken::new();
        token.cancel();
        let result = fetcher.fetch("https://example.com", &[], &token).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
