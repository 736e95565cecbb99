//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! Misses, expirations and capacity rejections are normal outcomes and are
//! never reported through this type.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid arguments passed to a cache operation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A structured value or its metadata could not be serialized
    #[error("Failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored JSON value could not be parsed back, the store is corrupt
    #[error("Corrupt cached value for key '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// No scheduler could be set up for the background sweep
    #[error("Scheduler unavailable: {0}")]
    Scheduler(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CacheError::InvalidRequest("Key cannot be empty".to_string());
        assert_eq!(err.to_string(), "Invalid request: Key cannot be empty");

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CacheError::Decode {
            key: "user:1".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("Corrupt cached value for key 'user:1'"));
    }
}
