// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::{CrawlerConfig, ProxyEntry};

/// Create a configured asynchronous HTTP client, optionally routed through a proxy.
pub fn create_async_client(
    config: &CrawlerConfig,
    proxy: Option<&ProxyEntry>,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs));
    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy.to_reqwest()?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_with_proxy() {
        let proxy = ProxyEntry::parse("127.0.0.1:3128").unwrap();
        assert!(create_async_client(&CrawlerConfig::default(), Some(&proxy)).is_ok());
        assert!(create_async_client(&CrawlerConfig::default(), None).is_ok());
    }
}
