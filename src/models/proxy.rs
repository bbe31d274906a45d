// src/models/proxy.rs

//! Proxy entry parsed from an external proxy list.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// One proxy address with optional basic-auth credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyEntry {
    /// `host:port`
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyEntry {
    /// Parse `host:port`, `user:pass@host:port`, optionally with an `http://` scheme.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let without_scheme = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .unwrap_or(trimmed);

        let (credentials, address) = match without_scheme.rsplit_once('@') {
            Some((creds, addr)) => (Some(creds), addr),
            None => (None, without_scheme),
        };

        let Some((host, port)) = address.rsplit_once(':') else {
            return Err(AppError::config(format!("proxy '{raw}' has no port")));
        };
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(AppError::config(format!("proxy '{raw}' is not host:port")));
        }

        let (username, password) = match credentials.and_then(|c| c.split_once(':')) {
            Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
            None => (credentials.map(str::to_string), None),
        };

        Ok(Self {
            address: address.to_string(),
            username,
            password,
        })
    }

    /// Build the reqwest proxy routing all schemes through this entry.
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        let proxy = reqwest::Proxy::all(format!("http://{}", self.address))?;
        Ok(match &self.username {
            Some(user) => proxy.basic_auth(user, self.password.as_deref().unwrap_or("")),
            None => proxy,
        })
    }
}

impl fmt::Display for ProxyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
