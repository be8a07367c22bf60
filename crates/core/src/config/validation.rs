//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is outside [100ms, 5 minutes]
    /// - `loop_threshold` or `max_tabs` is 0
    /// - a cache cap is 0, or `compress_threshold` exceeds `cache_max_bytes`
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.revalidate_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "revalidate_timeout_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.loop_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "loop_threshold".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.loop_window_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "loop_window_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_tabs == 0 {
            return Err(ConfigError::Invalid { field: "max_tabs".into(), reason: "must be at least 1".into() });
        }

        if self.cache_max_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_max_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.cache_max_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_max_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.compress_threshold as u64 > self.cache_max_bytes {
            return Err(ConfigError::Invalid {
                field: "compress_threshold".into(),
                reason: "must not exceed cache_max_bytes".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}
