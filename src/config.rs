//! Process-start configuration: which backend urls to try and how hard to try them.

use crate::executor::RetryPolicy;
use crate::requests::{Error, Result};

use serde::{Deserialize, Serialize};

use std::time::Duration;

pub const ENV_API_URL: &str = "MANGAVAANI_API_URL";
pub const ENV_API_FALLBACKS: &str = "MANGAVAANI_API_FALLBACKS";
pub const ENV_MAX_RETRIES: &str = "MANGAVAANI_MAX_RETRIES";
pub const ENV_RETRY_DELAY_MS: &str = "MANGAVAANI_RETRY_DELAY_MS";
pub const ENV_TIMEOUT_SECS: &str = "MANGAVAANI_TIMEOUT_SECS";

/// Loopback, Android emulator host alias, LAN address
pub const DEFAULT_FALLBACK_URLS: [&str; 3] = [
    "http://localhost:5000/api",
    "http://10.0.2.2:5000/api",
    "http://192.168.1.100:5000/api",
];

pub const DEFAULT_USER_AGENT: &str = "MangaVaani/0.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct ClientConfig {
    /// Tried before any of the fallbacks
    #[builder(into)]
    pub api_url: Option<String>,
    #[builder(default = default_fallback_urls())]
    pub fallback_urls: Vec<String>,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(into, default = DEFAULT_USER_AGENT.to_owned())]
    pub user_agent: String,
}

fn default_fallback_urls() -> Vec<String> {
    DEFAULT_FALLBACK_URLS.iter().map(|u| u.to_string()).collect()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientConfig {
    /// Defaults overridden by whatever `MANGAVAANI_*` variables are set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            config.api_url = Some(url.trim().to_owned());
        }

        if let Some(list) = lookup(ENV_API_FALLBACKS) {
            let urls: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_owned)
                .collect();

            if !urls.is_empty() {
                config.fallback_urls = urls;
            }
        }

        if let Some(retries) = lookup(ENV_MAX_RETRIES) {
            config.retry.max_retries = parse_number(ENV_MAX_RETRIES, &retries)?;
        }
        if let Some(delay) = lookup(ENV_RETRY_DELAY_MS) {
            config.retry.backoff = Duration::from_millis(parse_number(ENV_RETRY_DELAY_MS, &delay)?);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            config.retry.timeout = Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, &timeout)?);
        }

        Ok(config)
    }

    /// Override first, then fallbacks. Trailing slashes are dropped and repeats removed
    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = Vec::new();

        for url in self.api_url.iter().chain(self.fallback_urls.iter()) {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() && !endpoints.iter().any(|e| e == url) {
                endpoints.push(url.to_owned());
            }
        }

        endpoints
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

/// (De)serializes a [Duration] as whole milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};

    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
