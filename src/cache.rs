//! Epoch-keyed fact cache.
//!
//! A [`ModificationTracker`] counts source changes; every cached value records
//! the epoch it was computed in and is only served for that epoch. Callers own
//! the cache object and pass it where results are reused.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Monotonic modification counter
#[derive(Debug, Default)]
pub struct ModificationTracker {
    count: AtomicU64,
}

impl ModificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Record a modification and return the new epoch
    pub fn bump(&self) -> u64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[derive(Debug)]
pub struct FactCache<K, V> {
    entries: RwLock<HashMap<K, (u64, Arc<V>)>>,
}

impl<K, V> Default for FactCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> FactCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value computed for `key` in exactly `epoch`
    pub fn get(&self, key: &K, epoch: u64) -> Option<Arc<V>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|(computed_in, _)| *computed_in == epoch)
            .map(|(_, value)| Arc::clone(value))
    }

    /// Serve the value for (`key`, `epoch`) or compute and store it.
    ///
    /// `compute` runs without holding the lock. When two callers race on the
    /// same key and epoch, the first stored value wins and both get it.
    pub fn get_or_compute(&self, key: K, epoch: u64, compute: impl FnOnce() -> V) -> Arc<V> {
        if let Some(value) = self.get(&key, epoch) {
            return value;
        }

        let computed = Arc::new(compute());
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&key) {
            Some((computed_in, existing)) if *computed_in == epoch => Arc::clone(existing),
            // never replace a newer result with an older computation
            Some((computed_in, _)) if *computed_in > epoch => {
                debug!("Discarding result computed for stale epoch {}", epoch);
                computed
            }
            _ => {
                entries.insert(key, (epoch, Arc::clone(&computed)));
                computed
            }
        }
    }

    /// Drop every entry computed before `epoch`
    pub fn invalidate(&self, epoch: u64) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, (computed_in, _)| *computed_in >= epoch);
        debug!("Invalidated {} cache entries before epoch {}", before - entries.len(), epoch);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
