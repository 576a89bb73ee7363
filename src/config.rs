//! Scopus client configuration.
//!
//! The API key is the only required setting. It is resolved once, before the
//! first request, from the process environment (the binary loads a local
//! `.env` file first).

use crate::error::{Result, ScopusError};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Environment variable holding the Elsevier API key
pub const API_KEY_VAR: &str = "ELSEVIER_API_KEY";

/// Optional override for the search endpoint
pub const BASE_URL_VAR: &str = "ELSEVIER_BASE_URL";

/// Optional request timeout in seconds
pub const TIMEOUT_VAR: &str = "ELSEVIER_TIMEOUT_SECS";

/// Scopus search endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.elsevier.com/content/search/scopus";

/// Default transport timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved client settings.
#[derive(Clone)]
pub struct ScopusConfig {
    pub api_key: String,
    pub base_url: Url,
    pub timeout: Duration,
}

impl ScopusConfig {
    /// Build a config for `api_key` against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ScopusError::Config(format!("Missing {} in .env file.", API_KEY_VAR)));
        }

        Ok(Self {
            api_key,
            base_url: parse_base_url(DEFAULT_BASE_URL)?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Resolve settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR).unwrap_or_default();
        let mut config = Self::new(api_key)?;

        if let Some(raw) = lookup(BASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
            config.base_url = parse_base_url(raw.trim())?;
        }

        if let Some(raw) = lookup(TIMEOUT_VAR).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ScopusError::Config(format!("{} must be a whole number of seconds, got {:?}", TIMEOUT_VAR, raw))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Override the search endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    /// Override the transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// Keeps the key out of logs.
impl fmt::Debug for ScopusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopusConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ScopusError::Config(format!("Invalid base URL {:?}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ScopusError::Config(format!("Unsupported URL scheme: {}", other))),
    }
}
