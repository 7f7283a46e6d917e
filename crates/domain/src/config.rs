//! Configuration structures
//!
//! Plain serde types; loading from the environment and from disk lives in
//! `habitflow-infra::config`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_TIMEOUT_SECS, DEFAULT_API_URL, DEFAULT_MIN_RENEWAL_DELAY_MS,
    DEFAULT_RENEW_BEFORE_EXPIRY_MS,
};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to (no trailing slash)
    #[serde(default = "default_api_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_api_url(), timeout_secs: default_api_timeout() }
    }
}

/// Token lifecycle timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lead time before expiry at which the renewal timer fires
    #[serde(default = "default_renew_before_expiry")]
    pub renew_before_expiry_ms: u64,
    /// Floor for the renewal timer delay
    #[serde(default = "default_min_renewal_delay")]
    pub minimum_renewal_delay_ms: u64,
}

impl SessionConfig {
    #[must_use]
    pub fn renew_before_expiry(&self) -> Duration {
        Duration::from_millis(self.renew_before_expiry_ms)
    }

    #[must_use]
    pub fn minimum_renewal_delay(&self) -> Duration {
        Duration::from_millis(self.minimum_renewal_delay_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            renew_before_expiry_ms: default_renew_before_expiry(),
            minimum_renewal_delay_ms: default_min_renewal_delay(),
        }
    }
}

/// Durable storage location. `None` keeps the session in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

const fn default_api_timeout() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}

const fn default_renew_before_expiry() -> u64 {
    DEFAULT_RENEW_BEFORE_EXPIRY_MS
}

const fn default_min_renewal_delay() -> u64 {
    DEFAULT_MIN_RENEWAL_DELAY_MS
}
