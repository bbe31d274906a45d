// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Category discovery error
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },

    /// A structurally required field on a page could not be parsed
    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    /// Request through a proxy failed at the transport level
    #[error("Transport error via {proxy}: {message}")]
    Transport { proxy: String, message: String },

    /// Response carried an anti-bot marker
    #[error("Blocked response via {proxy}")]
    Blocked { proxy: String },

    /// Work was stopped by an external cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// A bounded wait ran out
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a page parse error for a single URL.
    pub fn parse(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a transport error for a proxy.
    pub fn transport(proxy: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            proxy: proxy.into(),
            message: message.to_string(),
        }
    }

    /// True for the cancellation condition.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for failures the fetcher recovers from by evicting the proxy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Blocked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_not_retryable() {
        assert!(AppError::Cancelled.is_cancelled());
        assert!(!AppError::Cancelled.is_retryable());
    }

    #[test]
    fn transport_and_block_are_retryable() {
        assert!(AppError::transport("1.2.3.4:80", "timed out").is_retryable());
        assert!(
            AppError::Blocked {
                proxy: "1.2.3.4:80".into()
            }
            .is_retryable()
        );
        assert!(!AppError::parse("https://x", "bad score").is_retryable());
    }
}
