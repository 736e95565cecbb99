//! Eviction Module
//!
//! Frees room for an incoming entry. Unlike LRU, importance decides first:
//!
//! 1. expired entries are dropped;
//! 2. importance levels are emptied from 1 upwards, least accessed and then
//!    oldest first. Levels up to [`RECYCLABLE_MAX_IMPORTANCE`] are evicted
//!    down to the low water mark, higher levels only until the entry fits;
//! 3. the three largest remaining entries are dropped;
//! 4. anything left is dropped in map order.
//!
//! Each step stops as soon as its target is reached.

use std::fmt;

use serde_json::json;

use crate::cache::{CacheStore, MAX_IMPORTANCE, MIN_IMPORTANCE, RECYCLABLE_MAX_IMPORTANCE};

/// How far eviction has to go before it may stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Fit the entry and get under the low water mark
    Strict,
    /// Fit the entry under the hard limits
    Loose,
}

// == Eviction Phase ==
/// The step in which an eviction pass reached its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPhase {
    Expired,
    Importance { level: u8 },
    Largest,
    Fallback,
    /// Every step ran and the entry still does not fit
    #[default]
    Exhausted,
}

impl fmt::Display for EvictionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPhase::Expired => write!(f, "step 1 (expired)"),
            EvictionPhase::Importance { level } => write!(f, "step 2 (importance, level {})", level),
            EvictionPhase::Largest => write!(f, "step 3 (largest)"),
            EvictionPhase::Fallback => write!(f, "step 4 (fallback)"),
            EvictionPhase::Exhausted => write!(f, "exhausted"),
        }
    }
}

// == Eviction Report ==
/// Outcome of one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Expired entries dropped in step 1
    pub expired: usize,
    /// Live entries dropped in steps 2 to 4
    pub evicted: usize,
    pub phase: EvictionPhase,
}

impl EvictionReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

impl CacheStore {
    // == Evict For ==
    /// Removes entries until `required` more bytes and one more entry fit.
    pub(super) fn evict_for(&mut self, required: u64) -> EvictionReport {
        self.log_state(
            "GC eviction started (memory pressure)",
            json!({ "required_bytes": required }),
        );

        let mut report = EvictionReport {
            expired: self.remove_expired(self.clock.now_ms()),
            ..EvictionReport::default()
        };
        let phase = self.run_phases(required, &mut report);
        report.phase = phase;

        self.log_state(
            &format!("GC eviction finished in {}", report.phase),
            json!({
                "removed": report.removed(),
                "expired": report.expired,
                "evicted": report.evicted,
            }),
        );
        report
    }

    fn run_phases(&mut self, required: u64, report: &mut EvictionReport) -> EvictionPhase {
        if self.target_reached(required, Target::Strict) {
            return EvictionPhase::Expired;
        }

        self.log_state("GC step 2 (importance)", json!({ "expired": report.expired }));
        for level in MIN_IMPORTANCE..=MAX_IMPORTANCE {
            let target = if level <= RECYCLABLE_MAX_IMPORTANCE {
                Target::Strict
            } else {
                Target::Loose
            };

            // Protected levels are never touched once the entry already fits
            if level == RECYCLABLE_MAX_IMPORTANCE + 1 && self.target_reached(required, target) {
                if report.evicted == 0 {
                    return EvictionPhase::Expired;
                }
                return EvictionPhase::Importance {
                    level: RECYCLABLE_MAX_IMPORTANCE,
                };
            }

            for key in self.candidates_at(level) {
                self.evict_entry(&key, report);
                if self.target_reached(required, target) {
                    return EvictionPhase::Importance { level };
                }
            }
        }

        if !self.target_reached(required, Target::Loose) {
            self.log_state("GC step 3 (largest)", json!({ "evicted": report.evicted }));
            for key in self.largest_keys() {
                self.evict_entry(&key, report);
                if self.target_reached(required, Target::Loose) {
                    return EvictionPhase::Largest;
                }
            }
        }

        if !self.target_reached(required, Target::Loose) {
            self.log_state("GC step 4 (fallback)", json!({ "evicted": report.evicted }));
            for key in self.key_snapshot() {
                self.evict_entry(&key, report);
                if self.target_reached(required, Target::Loose) {
                    return EvictionPhase::Fallback;
                }
            }
        }

        EvictionPhase::Exhausted
    }

    /// Checks whether an entry of `required` bytes can be admitted.
    fn target_reached(&self, required: u64, target: Target) -> bool {
        if self.needs_eviction(required) {
            return false;
        }

        match target {
            Target::Loose => true,
            Target::Strict => {
                let ratio = self.config.low_water_mark;
                let size_ok = (self.current_size + required) as f64
                    <= self.config.max_size_bytes as f64 * ratio;
                let count_ok = self
                    .config
                    .max_count
                    .map_or(true, |max| self.entries.len() as f64 <= max as f64 * ratio);
                size_ok && count_ok
            }
        }
    }

    /// Keys at exactly `level`, least accessed first, then oldest first.
    fn candidates_at(&self, level: u8) -> Vec<String> {
        let mut candidates: Vec<(u64, u64, u64, &str)> = self
            .entries
            .values()
            .filter(|entry| entry.importance == level)
            .map(|entry| {
                (
                    entry.access_count,
                    entry.created_at,
                    entry.sequence,
                    entry.key.as_str(),
                )
            })
            .collect();
        candidates.sort_unstable();

        candidates
            .into_iter()
            .map(|(_, _, _, key)| key.to_string())
            .collect()
    }

    /// Keys of the three largest entries, largest first, found in one pass.
    fn largest_keys(&self) -> Vec<String> {
        let mut top: [Option<(u64, &str)>; 3] = [None; 3];

        for entry in self.entries.values() {
            let candidate = (entry.size_bytes, entry.key.as_str());
            if let Some(slot) = top
                .iter()
                .position(|held| held.map_or(true, |(size, _)| candidate.0 > size))
            {
                top[slot..].rotate_right(1);
                top[slot] = Some(candidate);
            }
        }

        top.iter()
            .flatten()
            .map(|(_, key)| key.to_string())
            .collect()
    }

    fn evict_entry(&mut self, key: &str, report: &mut EvictionReport) {
        if self.remove_entry(key).is_some() {
            self.stats.record_eviction();
            report.evicted += 1;
        }
    }
}
