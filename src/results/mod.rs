//! # Results
//!
//! The two outputs of a benchmark run: a real-time, append-only stream of
//! individual [`LatencySample`] rows (newline-delimited JSON, fsynced per
//! append so a killed process loses at most the in-flight row), and an
//! end-of-phase [`PhaseSummary`] folding those samples into
//! [`DistributionStatistics`] and a [`ConcurrentHistogram`] snapshot.


use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::histogram::ConcurrentHistogram;
use crate::stats::{self, DistributionStatistics};
use crate::transaction::{LatencySample, Outcome, TransactionType};

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("failed to open results stream at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to append to results stream: {0}")]
    Append(#[source] std::io::Error),
}

/// One row of the results stream, the serializable projection of a
/// [`LatencySample`].
#[derive(Debug, Serialize)]
struct ResultRow {
    worker_id: u32,
    phase_id: u32,
    txn_type: u16,
    start_ns: u64,
    end_ns: u64,
    outcome: &'static str,
}

impl From<LatencySample> for ResultRow {
    fn from(s: LatencySample) -> Self {
        Self {
            worker_id: s.worker_id,
            phase_id: s.phase_id,
            txn_type: s.txn_type.0,
            start_ns: s.start_ns,
            end_ns: s.end_ns,
            outcome: outcome_tag(s.outcome),
        }
    }
}

fn outcome_tag(o: Outcome) -> &'static str {
    match o {
        Outcome::Success => "success",
        Outcome::UserAbort => "user_abort",
        Outcome::Retry => "retry",
        Outcome::RetryDifferent => "retry_different",
        Outcome::Error => "error",
        Outcome::Skipped => "skipped",
    }
}

/// Appends [`LatencySample`] rows to a file as newline-delimited JSON,
/// fsyncing after every append.
pub struct ResultsWriter {
    writer: BufWriter<File>,
}

impl ResultsWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ResultsError> {
        let path_ref = path.as_ref();
        let file = File::create(path_ref).map_err(|source| ResultsError::Open {
            path: path_ref.display().to_string(),
            source,
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, sample: LatencySample) -> Result<(), ResultsError> {
        let row = ResultRow::from(sample);
        let line = serde_json::to_string(&row).expect("ResultRow serialization cannot fail");
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(ResultsError::Append)?;
        self.writer.flush().map_err(ResultsError::Append)?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(ResultsError::Append)
    }
}

/// The end-of-phase summary: latency distribution plus outcome counts, per
/// transaction type.
#[derive(Debug)]
pub struct PhaseSummary {
    pub phase_id: u32,
    pub latency: DistributionStatistics,
    pub outcomes: ConcurrentHistogram<(TransactionType, Outcome)>,
}

impl PhaseSummary {
    /// Folds a phase's recorded samples into a summary. `samples` is
    /// consumed destructively for latency computation (see
    /// [`stats::compute`]'s contract).
    pub fn from_samples(phase_id: u32, samples: &[LatencySample]) -> Self {
        let outcomes = ConcurrentHistogram::new();
        for s in samples {
            outcomes.put((s.txn_type, s.outcome), 1);
        }

        let mut latencies: Vec<i64> = samples
            .iter()
            .map(|s| (s.end_ns.saturating_sub(s.start_ns)) as i64)
            .collect();

        Self {
            phase_id,
            latency: stats::compute(&mut latencies),
            outcomes,
        }
    }
}
