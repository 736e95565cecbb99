//! Key Enumeration Module
//!
//! Cursors over live keys. Each cursor snapshots the key set when created and
//! checks every key against the store as it is reached, so entries may be
//! removed underneath it without invalidating the traversal.

use std::sync::Arc;
use std::vec;

use parking_lot::Mutex;

use crate::cache::CacheStore;

// == Key Filter ==
/// Match applied on top of the base key enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    All,
    Prefix(String),
    Suffix(String),
    Contains(String),
}

impl KeyFilter {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyFilter::All => true,
            KeyFilter::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyFilter::Suffix(suffix) => key.ends_with(suffix.as_str()),
            KeyFilter::Contains(text) => key.contains(text.as_str()),
        }
    }
}

// == Keys ==
/// Live keys of a [`CacheStore`] borrowed for the duration of the traversal.
///
/// Expired entries met along the way are removed. Keys inserted after the
/// cursor was created are not visited.
#[derive(Debug)]
pub struct Keys<'a> {
    store: &'a mut CacheStore,
    pending: vec::IntoIter<String>,
}

impl<'a> Keys<'a> {
    pub(crate) fn new(store: &'a mut CacheStore) -> Self {
        let pending = store.key_snapshot().into_iter();
        Self { store, pending }
    }
}

impl Iterator for Keys<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for key in self.pending.by_ref() {
            if self.store.retain_if_live(&key) {
                return Some(key);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.pending.size_hint().1)
    }
}

// == Shared Keys ==
/// Live keys of a shared store. The lock is taken once per key, so other
/// cache operations can run between two calls to `next`.
#[derive(Debug)]
pub struct SharedKeys {
    store: Arc<Mutex<CacheStore>>,
    pending: vec::IntoIter<String>,
    filter: KeyFilter,
}

impl SharedKeys {
    pub(crate) fn new(store: Arc<Mutex<CacheStore>>, filter: KeyFilter) -> Self {
        let pending = store.lock().key_snapshot().into_iter();
        Self {
            store,
            pending,
            filter,
        }
    }
}

impl Iterator for SharedKeys {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for key in self.pending.by_ref() {
            // Liveness first: expired entries are dropped even when filtered out
            let live = self.store.lock().retain_if_live(&key);
            if live && self.filter.matches(&key) {
                return Some(key);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.pending.size_hint().1)
    }
}
