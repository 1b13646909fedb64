//! # Phase
//!
//! An immutable description of one contiguous stage of a benchmark run: a
//! weighted transaction mix, the number of terminals that should be active,
//! a rate mode, and a duration. Phases are built once at configuration time
//! and never mutated afterward — [`crate::workload::WorkloadState`] only
//! ever reads one.


use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;

use crate::transaction::TransactionType;

/// How a [`Phase`] produces and gates work for its active terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateMode {
    /// No terminal is active; the phase exists only to occupy a slot in the
    /// schedule (e.g. a cooldown).
    Disabled,
    /// Terminals pull one transaction at a time, in a fixed deterministic
    /// order, never from the async work queue.
    Serial,
    /// Terminals execute back-to-back with no external pacing.
    UnlimitedRate,
    /// A rate generator feeds the work queue at the given transactions per
    /// second.
    RateLimited { rps: u32 },
}

/// One `(transaction type, weight)` entry in a phase's mix. Weights are
/// relative, not fractions — they are normalized at sampling time.
#[derive(Debug, Clone, Copy)]
pub struct WeightedEntry {
    pub txn_type: TransactionType,
    pub weight: u32,
}

/// An immutable benchmark stage.
pub struct Phase {
    pub id: u32,
    mix: Vec<WeightedEntry>,
    total_weight: u32,
    pub active_terminals: u32,
    pub mode: RateMode,
    pub duration: Duration,
    /// Position of the next transaction to hand out in [`RateMode::Serial`]
    /// mode. Atomic because multiple workers may call `next_serial`
    /// concurrently even though only one terminal is meant to be "it" at a
    /// time during serial phases in practice.
    serial_cursor: AtomicUsize,
}

impl Phase {
    /// Builds a phase from its weighted mix. Panics if `mode` is not
    /// [`RateMode::Disabled`] and the mix sums to zero weight, matching the
    /// data-model invariant that a live phase must have a samplable mix.
    pub fn new(
        id: u32,
        mix: Vec<WeightedEntry>,
        active_terminals: u32,
        mode: RateMode,
        duration: Duration,
    ) -> Self {
        let total_weight: u32 = mix.iter().map(|e| e.weight).sum();
        if mode != RateMode::Disabled {
            assert!(
                total_weight > 0,
                "phase {id} is active but its transaction mix has zero total weight"
            );
        }

        Self {
            id,
            mix,
            total_weight,
            active_terminals,
            mode,
            duration,
            serial_cursor: AtomicUsize::new(0),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.mode == RateMode::Disabled
    }

    pub fn is_serial(&self) -> bool {
        self.mode == RateMode::Serial
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self.mode, RateMode::RateLimited { .. })
    }

    /// Samples one transaction type from the weighted mix using `rng`.
    ///
    /// Panics if called on a disabled phase (total weight zero) — callers
    /// must check [`Phase::is_disabled`] first.
    pub fn sample_mix(&self, rng: &mut impl Rng) -> TransactionType {
        assert!(self.total_weight > 0, "cannot sample an empty phase mix");
        let mut pick = rng.random_range(0..self.total_weight);
        for entry in &self.mix {
            if pick < entry.weight {
                return entry.txn_type;
            }
            pick -= entry.weight;
        }
        unreachable!("weighted sample exceeded total_weight accounting");
    }

    /// Returns the next transaction type in serial order and advances the
    /// cursor, wrapping back to the start of the mix.
    pub fn next_serial(&self) -> TransactionType {
        assert!(!self.mix.is_empty(), "cannot serialize an empty phase mix");
        let idx = self.serial_cursor.fetch_add(1, Ordering::Relaxed) % self.mix.len();
        self.mix[idx].txn_type
    }

    /// Resets the serial cursor to the start of the mix, called by
    /// [`crate::workload::WorkloadState::switch_to_next_phase`].
    pub fn reset_serial_cursor(&self) {
        self.serial_cursor.store(0, Ordering::Relaxed);
    }
}
