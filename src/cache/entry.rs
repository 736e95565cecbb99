//! Cache Entry Module
//!
//! Defines individual cache entries, the value shapes they hold and the
//! per-entry options accepted by `set`.

use std::time::Duration;

use serde_json::Value;

use crate::cache::DEFAULT_IMPORTANCE;
use crate::error::{CacheError, Result};

// == Value Kind ==
/// Shape tag of a cached value, preserved so reads return what was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bytes,
    Text,
    Json,
}

// == Cache Value ==
/// A value as handed to and returned from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// Raw binary data, returned as-is
    Bytes(Vec<u8>),
    /// UTF-8 text, returned as-is
    Text(String),
    /// Structured data, stored serialized and parsed back on read
    Json(Value),
}

impl CacheValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CacheValue::Bytes(_) => ValueKind::Bytes,
            CacheValue::Text(_) => ValueKind::Text,
            CacheValue::Json(_) => ValueKind::Json,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CacheValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CacheValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            CacheValue::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl From<String> for CacheValue {
    fn from(text: String) -> Self {
        CacheValue::Text(text)
    }
}

impl From<&str> for CacheValue {
    fn from(text: &str) -> Self {
        CacheValue::Text(text.to_string())
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(bytes: Vec<u8>) -> Self {
        CacheValue::Bytes(bytes)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(bytes: &[u8]) -> Self {
        CacheValue::Bytes(bytes.to_vec())
    }
}

impl From<Value> for CacheValue {
    fn from(value: Value) -> Self {
        CacheValue::Json(value)
    }
}

// == Stored Value ==
/// The encoded form of a [`CacheValue`] kept inside an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Bytes(Vec<u8>),
    Text(String),
    /// Serialized JSON text
    Json(String),
}

impl StoredValue {
    /// Encodes a value for storage under `key`.
    pub fn encode(key: &str, value: CacheValue) -> Result<Self> {
        Ok(match value {
            CacheValue::Bytes(bytes) => StoredValue::Bytes(bytes),
            CacheValue::Text(text) => StoredValue::Text(text),
            CacheValue::Json(value) => {
                let serialized =
                    serde_json::to_string(&value).map_err(|source| CacheError::Encode {
                        key: key.to_string(),
                        source,
                    })?;
                StoredValue::Json(serialized)
            }
        })
    }

    /// Rebuilds the original value. Failing to parse stored JSON means the
    /// entry was corrupted.
    pub fn decode(&self, key: &str) -> Result<CacheValue> {
        Ok(match self {
            StoredValue::Bytes(bytes) => CacheValue::Bytes(bytes.clone()),
            StoredValue::Text(text) => CacheValue::Text(text.clone()),
            StoredValue::Json(serialized) => {
                let value = serde_json::from_str(serialized).map_err(|source| {
                    CacheError::Decode {
                        key: key.to_string(),
                        source,
                    }
                })?;
                CacheValue::Json(value)
            }
        })
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            StoredValue::Bytes(_) => ValueKind::Bytes,
            StoredValue::Text(_) => ValueKind::Text,
            StoredValue::Json(_) => ValueKind::Json,
        }
    }
}

// == Entry Options ==
/// Per-entry options for `set`.
#[derive(Debug, Clone, Default)]
pub struct EntryOptions {
    /// Eviction resistance in 1..=10, defaults to 1
    pub importance: Option<u8>,
    /// Time to live, relative to insertion
    pub ttl: Option<Duration>,
    /// Absolute expiration (Unix milliseconds), wins over `ttl`
    pub expires_at: Option<u64>,
    /// Opaque attachment returned by `get_with_meta`
    pub meta: Option<Value>,
}

impl EntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn importance(mut self, importance: u8) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn expires_at(mut self, expires_at_ms: u64) -> Self {
        self.expires_at = Some(expires_at_ms);
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub(crate) fn effective_importance(&self) -> u8 {
        self.importance.unwrap_or(DEFAULT_IMPORTANCE)
    }

    /// Resolves the absolute expiration for an entry created at `now`.
    ///
    /// A zero TTL or a zero timestamp means no expiration.
    pub(crate) fn resolve_expiry(&self, now: u64) -> Option<u64> {
        match (self.expires_at, self.ttl) {
            (Some(at), _) if at > 0 => Some(at),
            (_, Some(ttl)) if !ttl.is_zero() => Some(now.saturating_add(ttl.as_millis() as u64)),
            _ => None,
        }
    }

    /// Metadata worth storing. JSON null counts as no metadata.
    pub(crate) fn take_meta(&mut self) -> Option<Value> {
        self.meta.take().filter(|meta| !meta.is_null())
    }
}

// == Cached Item ==
/// A value returned together with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedItem {
    pub value: CacheValue,
    pub meta: Option<Value>,
}

// == Cache Entry ==
/// Represents a single cache entry with value and bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: String,
    /// The stored value
    pub value: StoredValue,
    /// Estimated size in bytes
    pub size_bytes: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Number of non-peek reads
    pub access_count: u64,
    /// Eviction resistance, higher is kept longer
    pub importance: u8,
    /// Opaque attachment
    pub meta: Option<Value>,
    /// Insertion order, breaks ties between entries created in the same millisecond
    pub(crate) sequence: u64,
}

impl CacheEntry {
    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is live up to and including its expiration instant.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }
}
