//! # Distribution Statistics
//!
//! Computes summary statistics — mean, sample standard deviation, and a fixed
//! set of percentiles — over a buffer of latency samples (nanoseconds).
//!
//! ## Algorithm
//!
//! A first pass accumulates sum, min, and max in `O(n)`. A second pass
//! accumulates the sum of squared deviations for the sample standard
//! deviation (`n − 1` denominator; zero when `n ≤ 1`).
//!
//! Percentiles are computed differently depending on sample size:
//! - `n ≤ SORT_THRESHOLD`: the buffer is fully sorted once, and each
//!   percentile indexes directly into it.
//! - `n > SORT_THRESHOLD`: each percentile is resolved independently with a
//!   randomized-pivot quickselect over the same mutable buffer. The buffer's
//!   order after one quickselect call is not relied upon by the next — each
//!   call re-partitions from scratch.
//!
//! The input buffer **is mutated** by this call (reordered in place) — this
//! is a documented, not accidental, part of the contract; callers that need
//! the original order must clone first.

#[cfg(test)]
mod tests;

use rand::Rng;

/// The fixed set of percentile points this module reports.
pub const PERCENTILE_POINTS: [f64; 8] = [0.0, 0.25, 0.5, 0.75, 0.9, 0.95, 0.99, 1.0];

/// Sample counts at or below this threshold are fully sorted; above it,
/// percentiles are resolved by quickselect instead.
const SORT_THRESHOLD: usize = 10_000;

/// Sentinel value reported for every percentile when the input is empty.
pub const EMPTY_SENTINEL: i64 = -1;

/// An immutable summary of a latency sample (nanoseconds).
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionStatistics {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub min: i64,
    pub max: i64,
    /// Percentiles in the same order as [`PERCENTILE_POINTS`].
    pub percentiles: [i64; 8],
}

impl DistributionStatistics {
    /// Returns the value at percentile `p` (e.g. `0.99` for p99), looking it
    /// up by position in [`PERCENTILE_POINTS`].
    ///
    /// Panics if `p` is not one of the fixed percentile points — callers are
    /// expected to use the named constants, not arbitrary fractions.
    pub fn percentile(&self, p: f64) -> i64 {
        let idx = PERCENTILE_POINTS
            .iter()
            .position(|&point| (point - p).abs() < f64::EPSILON)
            .expect("percentile must be one of PERCENTILE_POINTS");
        self.percentiles[idx]
    }

    pub fn p50(&self) -> i64 {
        self.percentile(0.5)
    }

    pub fn p90(&self) -> i64 {
        self.percentile(0.9)
    }

    pub fn p95(&self) -> i64 {
        self.percentile(0.95)
    }

    pub fn p99(&self) -> i64 {
        self.percentile(0.99)
    }

    fn empty() -> Self {
        tracing::warn!("computing distribution statistics over an empty sample");
        Self {
            count: 0,
            mean: 0.0,
            stddev: 0.0,
            min: EMPTY_SENTINEL,
            max: EMPTY_SENTINEL,
            percentiles: [EMPTY_SENTINEL; 8],
        }
    }
}

/// Computes [`DistributionStatistics`] over `samples`, mutating it in place.
///
/// `samples` is nanosecond latencies. An empty slice yields a zero-count
/// record with sentinel `-1` percentiles and emits a warning.
pub fn compute(samples: &mut [i64]) -> DistributionStatistics {
    if samples.is_empty() {
        return DistributionStatistics::empty();
    }

    let n = samples.len();
    let mut sum: i128 = 0;
    let mut min = samples[0];
    let mut max = samples[0];

    for &v in samples.iter() {
        sum += v as i128;
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }

    let mean = sum as f64 / n as f64;

    let stddev = if n <= 1 {
        0.0
    } else {
        let mut sq_dev_sum = 0.0f64;
        for &v in samples.iter() {
            let dev = v as f64 - mean;
            sq_dev_sum += dev * dev;
        }
        (sq_dev_sum / (n - 1) as f64).sqrt()
    };

    let percentiles = if n <= SORT_THRESHOLD {
        samples.sort_unstable();
        PERCENTILE_POINTS.map(|p| samples[percentile_index(p, n)])
    } else {
        let mut rng = rand::rng();
        PERCENTILE_POINTS.map(|p| {
            if p == 0.0 {
                min
            } else if p == 1.0 {
                max
            } else {
                quickselect(samples, percentile_index(p, n), &mut rng)
            }
        })
    };

    DistributionStatistics {
        count: n,
        mean,
        stddev,
        min,
        max,
        percentiles,
    }
}

/// Index into a sorted array of length `n` for percentile `p`, clamped to
/// `n - 1` so `p = 1.0` never indexes out of bounds.
fn percentile_index(p: f64, n: usize) -> usize {
    let idx = (p * n as f64) as usize;
    idx.min(n - 1)
}

/// Randomized-pivot quickselect: returns the value that would sit at `k` in
/// the fully sorted array, partitioning `buf` in place. Each call is
/// independent — it does not assume `buf` carries any ordering left behind
/// by a previous call.
fn quickselect(buf: &mut [i64], k: usize, rng: &mut impl Rng) -> i64 {
    let mut lo = 0usize;
    let mut hi = buf.len() - 1;

    loop {
        if lo == hi {
            return buf[lo];
        }

        let pivot_idx = lo + rng.random_range(0..=(hi - lo));
        let pivot = buf[pivot_idx];
        buf.swap(pivot_idx, hi);

        let mut store = lo;
        for i in lo..hi {
            if buf[i] < pivot {
                buf.swap(i, store);
                store += 1;
            }
        }
        buf.swap(store, hi);

        match k.cmp(&store) {
            std::cmp::Ordering::Equal => return buf[store],
            std::cmp::Ordering::Less => hi = store - 1,
            std::cmp::Ordering::Greater => lo = store + 1,
        }
    }
}
