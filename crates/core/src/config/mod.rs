//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OVERCOAT_*)
//! 2. TOML config file (if OVERCOAT_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The refresh-loop and debounce tunables are deliberately configuration
//! rather than constants: the right values are a product decision, and
//! embedders are expected to adjust them.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OVERCOAT_*)
/// 2. TOML config file (if OVERCOAT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite key-value store backing session state and the
    /// HTTP cache blob.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for outbound HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Full-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Timeout for conditional revalidation probes in milliseconds.
    ///
    /// Kept short: on expiry the cache proceeds as if the probe failed.
    #[serde(default = "default_revalidate_timeout_ms")]
    pub revalidate_timeout_ms: u64,

    /// Debounce window for session writes to the key-value store.
    #[serde(default = "default_session_flush_ms")]
    pub session_flush_ms: u64,

    /// Debounce window for session writes to the profile channel.
    #[serde(default = "default_profile_flush_ms")]
    pub profile_flush_ms: u64,

    /// Bounded wait for a profile load during session restore.
    #[serde(default = "default_profile_load_timeout_ms")]
    pub profile_load_timeout_ms: u64,

    /// Same-URL reloads tolerated inside the observation window before
    /// the loop breaker suppresses further propagation.
    #[serde(default = "default_loop_threshold")]
    pub loop_threshold: u32,

    /// Observation window for the refresh-loop counter, in milliseconds.
    #[serde(default = "default_loop_window_ms")]
    pub loop_window_ms: u64,

    /// Upper bound on the number of open tabs.
    #[serde(default = "default_max_tabs")]
    pub max_tabs: usize,

    /// HTTP cache entry-count cap.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// HTTP cache aggregate stored-byte cap.
    #[serde(default = "default_cache_max_bytes")]
    pub cache_max_bytes: u64,

    /// Response bodies above this size are compressed before storage.
    #[serde(default = "default_compress_threshold")]
    pub compress_threshold: usize,

    /// Cache TTL in seconds when the response carries no max-age.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Whether to issue conditional HEAD probes for fresh entries that
    /// carry validators.
    #[serde(default = "default_true")]
    pub revalidate: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./overcoat.sqlite")
}

fn default_user_agent() -> String {
    "overcoat/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_revalidate_timeout_ms() -> u64 {
    4_000
}

fn default_session_flush_ms() -> u64 {
    250
}

fn default_profile_flush_ms() -> u64 {
    1_000
}

fn default_profile_load_timeout_ms() -> u64 {
    2_000
}

fn default_loop_threshold() -> u32 {
    3
}

fn default_loop_window_ms() -> u64 {
    10_000
}

fn default_max_tabs() -> usize {
    50
}

fn default_cache_max_entries() -> usize {
    100
}

fn default_cache_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_compress_threshold() -> usize {
    4_096
}

fn default_ttl_secs() -> u64 {
    3_600
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            revalidate_timeout_ms: default_revalidate_timeout_ms(),
            session_flush_ms: default_session_flush_ms(),
            profile_flush_ms: default_profile_flush_ms(),
            profile_load_timeout_ms: default_profile_load_timeout_ms(),
            loop_threshold: default_loop_threshold(),
            loop_window_ms: default_loop_window_ms(),
            max_tabs: default_max_tabs(),
            cache_max_entries: default_cache_max_entries(),
            cache_max_bytes: default_cache_max_bytes(),
            compress_threshold: default_compress_threshold(),
            default_ttl_secs: default_ttl_secs(),
            revalidate: true,
        }
    }
}

impl AppConfig {
    /// Full-request timeout as a Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Revalidation probe timeout as a Duration.
    pub fn revalidate_timeout(&self) -> Duration {
        Duration::from_millis(self.revalidate_timeout_ms)
    }

    /// Debounce window for the key-value store target.
    pub fn session_flush(&self) -> Duration {
        Duration::from_millis(self.session_flush_ms)
    }

    /// Debounce window for the profile channel target.
    pub fn profile_flush(&self) -> Duration {
        Duration::from_millis(self.profile_flush_ms)
    }

    /// Bounded wait for a profile load during restore.
    pub fn profile_load_timeout(&self) -> Duration {
        Duration::from_millis(self.profile_load_timeout_ms)
    }

    /// Observation window for the refresh-loop counter.
    pub fn loop_window(&self) -> Duration {
        Duration::from_millis(self.loop_window_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OVERCOAT_`
    /// 2. TOML file from `OVERCOAT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or validation
    /// fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OVERCOAT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OVERCOAT_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
