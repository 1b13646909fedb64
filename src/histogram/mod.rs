//! # Concurrent Histogram
//!
//! A lock-free `K -> count` map used to accumulate per-transaction-type
//! outcome counts (committed, retried, aborted, failed) while workers run
//! concurrently. Built on [`crossbeam_skiplist::SkipMap`], whose get/insert
//! paths never block a writer on a reader.
//!
//! Unlike [`crate::workload`]'s phase coordination, nothing here uses a
//! `Mutex` — the map itself is the only shared state, and every mutation is
//! a single atomic fetch-add on the entry's counter.


use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_skiplist::SkipMap;

/// A lock-free histogram over keys `K`, each mapped to a monotonically
/// increasing count.
///
/// `K` must be `Ord` (required by the underlying skip list) and cheap to
/// clone — keys are typically small enums or integers (transaction type
/// ids), never arbitrary user data.
pub struct ConcurrentHistogram<K> {
    counts: SkipMap<K, AtomicU64>,
}

impl<K: Ord + Send + 'static> Default for ConcurrentHistogram<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Send + 'static> ConcurrentHistogram<K> {
    pub fn new() -> Self {
        Self {
            counts: SkipMap::new(),
        }
    }

    /// Increments the count for `key` by `delta`, creating the entry with an
    /// initial value of `delta` if it did not already exist.
    pub fn put(&self, key: K, delta: u64) {
        match self.counts.get(&key) {
            Some(entry) => {
                entry.value().fetch_add(delta, Ordering::Relaxed);
            }
            None => {
                // Racing inserts for the same fresh key are possible; the
                // losing insert's AtomicU64 is simply dropped, and we fall
                // through to incrementing the entry that won.
                let entry = self.counts.get_or_insert(key, AtomicU64::new(0));
                entry.value().fetch_add(delta, Ordering::Relaxed);
            }
        }
    }

    /// Returns the current count for `key`, or `0` if it has never been
    /// observed.
    pub fn get(&self, key: &K) -> u64
    where
        K: Clone,
    {
        self.counts
            .get(key)
            .map(|e| e.value().load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Returns every key currently present, in ascending order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.counts.iter().map(|e| e.key().clone()).collect()
    }

    /// Returns a point-in-time `(key, count)` snapshot, in ascending key
    /// order. Concurrent `put` calls during the scan may or may not be
    /// reflected in the result; no entry is ever double-counted or lost.
    pub fn snapshot(&self) -> Vec<(K, u64)>
    where
        K: Clone,
    {
        self.counts
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect()
    }

    /// Sum of every key's count.
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .map(|e| e.value().load(Ordering::Relaxed))
            .sum()
    }

    /// Folds the counts of `other` into `self`, key by key.
    pub fn merge(&self, other: &ConcurrentHistogram<K>)
    where
        K: Clone,
    {
        for entry in other.counts.iter() {
            self.put(entry.key().clone(), entry.value().load(Ordering::Relaxed));
        }
    }
}
