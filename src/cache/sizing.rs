//! Size Estimation Module
//!
//! Heuristic size model used to enforce the byte limit. Sizes are
//! approximations of memory cost, not exact accounting.

use std::fmt;

use crate::cache::{StoredValue, ENTRY_OVERHEAD_BYTES};

// == Size Estimator Trait ==
/// Strategy for estimating the cost of an entry.
///
/// Only [`SizeEstimator::value_size`] and [`SizeEstimator::meta_size`] have to
/// be provided; the total adds the per-entry overhead.
pub trait SizeEstimator: Send + Sync + fmt::Debug {
    /// Estimated cost of a stored value.
    fn value_size(&self, value: &StoredValue) -> u64;

    /// Estimated cost of serialized metadata.
    fn meta_size(&self, serialized_meta: &str) -> u64;

    /// Fixed cost of the entry bookkeeping.
    fn entry_overhead(&self) -> u64 {
        ENTRY_OVERHEAD_BYTES
    }

    /// Total estimated size of an entry.
    fn estimate(&self, value: &StoredValue, serialized_meta: Option<&str>) -> u64 {
        self.value_size(value)
            + serialized_meta.map_or(0, |meta| self.meta_size(meta))
            + self.entry_overhead()
    }
}

// == Default Estimator ==
/// Counts text as two bytes per UTF-16 code unit and binary data by its exact
/// length. Structured values and metadata are measured in their serialized form.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSizeEstimator;

impl DefaultSizeEstimator {
    fn text_cost(text: &str) -> u64 {
        text.encode_utf16().count() as u64 * 2
    }
}

impl SizeEstimator for DefaultSizeEstimator {
    fn value_size(&self, value: &StoredValue) -> u64 {
        match value {
            StoredValue::Bytes(bytes) => bytes.len() as u64,
            StoredValue::Text(text) => Self::text_cost(text),
            StoredValue::Json(serialized) => Self::text_cost(serialized),
        }
    }

    fn meta_size(&self, serialized_meta: &str) -> u64 {
        Self::text_cost(serialized_meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_counts_utf16_units() {
        let estimator = DefaultSizeEstimator;
        assert_eq!(estimator.value_size(&StoredValue::Text("abc".into())), 6);
        // 'é' is one UTF-16 unit, the emoji is a surrogate pair
        assert_eq!(estimator.value_size(&StoredValue::Text("é".into())), 2);
        assert_eq!(estimator.value_size(&StoredValue::Text("😀".into())), 4);
    }

    #[test]
    fn test_bytes_exact_length() {
        let estimator = DefaultSizeEstimator;
        assert_eq!(estimator.value_size(&StoredValue::Bytes(vec![0; 42])), 42);
    }

    #[test]
    fn test_estimate_adds_meta_and_overhead() {
        let estimator = DefaultSizeEstimator;
        let value = StoredValue::Json(r#"{"a":1}"#.into());

        assert_eq!(estimator.estimate(&value, None), 14 + ENTRY_OVERHEAD_BYTES);
        assert_eq!(
            estimator.estimate(&value, Some(r#""tag""#)),
            14 + 10 + ENTRY_OVERHEAD_BYTES
        );
    }
}
