//! Configuration Module
//!
//! Cache limits and sweep settings, with defaults, environment loading and validation.

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{DEFAULT_CLEANUP_INTERVAL_MS, DEFAULT_LOW_WATER_MARK, DEFAULT_MAX_SIZE_BYTES};
use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// Fixed at construction time. Values can be loaded from environment variables
/// or deserialized, missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the cache instance, used in diagnostics
    pub name: String,
    /// Maximum number of entries, None = unbounded
    pub max_count: Option<usize>,
    /// Maximum total estimated size in bytes
    pub max_size_bytes: u64,
    /// Interval of the background sweep in milliseconds, 0 disables it
    pub cleanup_interval_ms: u64,
    /// Fraction of each limit that eviction tries to get under
    pub low_water_mark: f64,
}

impl CacheConfig {
    /// Creates a configuration with default limits for the named cache.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }

    pub fn with_max_size_bytes(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn with_cleanup_interval_ms(mut self, cleanup_interval_ms: u64) -> Self {
        self.cleanup_interval_ms = cleanup_interval_ms;
        self
    }

    pub fn with_low_water_mark(mut self, low_water_mark: f64) -> Self {
        self.low_water_mark = low_water_mark;
        self
    }

    /// Creates a new CacheConfig for the named cache by loading limits from
    /// environment variables.
    ///
    /// # Environment Variables
    /// - `MEMCACHE_MAX_COUNT` - Maximum entries (default: unbounded)
    /// - `MEMCACHE_MAX_SIZE_BYTES` - Maximum total size (default: 50 MiB)
    /// - `MEMCACHE_CLEANUP_INTERVAL_MS` - Sweep interval (default: 60000)
    /// - `MEMCACHE_LOW_WATER_MARK` - Eviction buffer ratio (default: 0.9)
    pub fn from_env(name: impl Into<String>) -> Self {
        let defaults = Self::new(name);
        Self {
            max_count: env::var("MEMCACHE_MAX_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.max_count),
            max_size_bytes: env::var("MEMCACHE_MAX_SIZE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_size_bytes),
            cleanup_interval_ms: env::var("MEMCACHE_CLEANUP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cleanup_interval_ms),
            low_water_mark: env::var("MEMCACHE_LOW_WATER_MARK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.low_water_mark),
            ..defaults
        }
    }

    /// Checks the configuration for values the cache cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CacheError::InvalidConfig(
                "Cache name cannot be empty".to_string(),
            ));
        }
        if !(self.low_water_mark > 0.0 && self.low_water_mark <= 1.0) {
            return Err(CacheError::InvalidConfig(format!(
                "Low water mark must be in (0, 1], got {}",
                self.low_water_mark
            )));
        }
        Ok(())
    }

    /// Returns the sweep interval, or None when the sweep is disabled.
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_ms > 0).then(|| Duration::from_millis(self.cleanup_interval_ms))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_count: None,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_count, None);
        assert_eq!(config.max_size_bytes, 50 * 1024 * 1024);
        assert_eq!(config.cleanup_interval_ms, 60_000);
        assert_eq!(config.low_water_mark, 0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("MEMCACHE_MAX_COUNT");
        env::remove_var("MEMCACHE_MAX_SIZE_BYTES");
        env::remove_var("MEMCACHE_CLEANUP_INTERVAL_MS");
        env::remove_var("MEMCACHE_LOW_WATER_MARK");

        let config = CacheConfig::from_env("pages");
        assert_eq!(config.name, "pages");
        assert_eq!(config, CacheConfig::new("pages"));
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"name": "users", "max_count": 10}"#).unwrap();
        assert_eq!(config.name, "users");
        assert_eq!(config.max_count, Some(10));
        assert_eq!(config.max_size_bytes, DEFAULT_MAX_SIZE_BYTES);
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::new("").validate().is_err());
        assert!(CacheConfig::new("a").with_low_water_mark(0.0).validate().is_err());
        assert!(CacheConfig::new("a").with_low_water_mark(1.5).validate().is_err());
        assert!(CacheConfig::new("a").with_low_water_mark(1.0).validate().is_ok());
    }

    #[test]
    fn test_cleanup_interval() {
        let config = CacheConfig::new("a").with_cleanup_interval_ms(0);
        assert_eq!(config.cleanup_interval(), None);

        let config = config.with_cleanup_interval_ms(250);
        assert_eq!(config.cleanup_interval(), Some(Duration::from_millis(250)));
    }
}
