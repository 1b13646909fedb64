//! # Worker
//!
//! One virtual terminal: owns a [`ConnectionManager`], repeatedly pulls work
//! from its [`WorkloadState`], executes the chosen transaction body through
//! the attempt loop described in the error-handling design, and appends a
//! [`LatencySample`] for every attempt.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use thiserror::Error;
use tracing::{error, trace, warn};

use crate::benchmark_state::BenchmarkState;
use crate::classifier::{self, ErrorClass, RawError};
use crate::connection::{ConnectionError, ConnectionManager};
use crate::transaction::{LatencySample, Outcome, TransactionType, TxnExecutor};
use crate::workload::WorkloadState;

/// Number of in-place retry attempts (RETRY / UNKNOWN classes) before an
/// attempt is surfaced as `Outcome::Error`.
pub const N_RETRY: u32 = 10;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("no executor registered for transaction type {0:?}")]
    MissingExecutor(TransactionType),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Appends a completed [`LatencySample`] somewhere — the results stream, in
/// production. A worker never constructs its own writer; the orchestrator
/// hands it one.
pub trait SampleSink: Send {
    fn record(&mut self, sample: LatencySample);
}

/// One virtual terminal.
pub struct Worker {
    pub id: u32,
    workload: Arc<WorkloadState>,
    benchmark_state: Arc<BenchmarkState>,
    connection: ConnectionManager,
    executors: HashMap<TransactionType, Arc<dyn TxnExecutor>>,
    sink: Box<dyn SampleSink>,
    samples: Vec<LatencySample>,
}

impl Worker {
    pub fn new(
        id: u32,
        workload: Arc<WorkloadState>,
        benchmark_state: Arc<BenchmarkState>,
        connection: ConnectionManager,
        executors: HashMap<TransactionType, Arc<dyn TxnExecutor>>,
        sink: Box<dyn SampleSink>,
    ) -> Self {
        Self {
            id,
            workload,
            benchmark_state,
            connection,
            executors,
            sink,
            samples: Vec::new(),
        }
    }

    /// Runs the worker's main loop until the workload yields no more work or
    /// the benchmark state becomes terminal. Returns the samples recorded
    /// by this worker, in start-ns order.
    pub fn run(mut self) -> Result<Vec<LatencySample>, WorkerError> {
        self.connection.connect()?;
        self.benchmark_state.block_for_start();

        let mut rng = rand::rng();
        loop {
            self.workload.stay_awake();

            if self.benchmark_state.current().is_terminal() {
                break;
            }

            let Some(proc) = self.workload.fetch_work(self.id, &mut rng) else {
                break;
            };

            let start_ns = now_ns();
            let outcome = self.attempt(proc.txn_type, &mut rng);
            let end_ns = now_ns();

            let sample = LatencySample {
                worker_id: self.id,
                phase_id: self.workload.current_phase_id().unwrap_or(u32::MAX),
                txn_type: proc.txn_type,
                start_ns,
                end_ns,
                outcome,
            };
            self.sink.record(sample);
            self.samples.push(sample);

            self.workload.finished_work();
        }

        self.connection.close();
        self.benchmark_state.signal_done();
        self.workload.signal_done();

        Ok(self.samples)
    }

    /// Runs the retry/abort/reconnect attempt loop for one transaction type,
    /// returning the terminal [`Outcome`] for this procedure.
    fn attempt(&mut self, txn_type: TransactionType, rng: &mut impl Rng) -> Outcome {
        let mut attempts = 0u32;

        loop {
            if self.benchmark_state.current().is_terminal() {
                return Outcome::Error;
            }

            let executor = match self.executors.get(&txn_type) {
                Some(e) => Arc::clone(e),
                None => {
                    error!(?txn_type, "no executor registered, skipping");
                    return Outcome::Skipped;
                }
            };

            let result = self
                .connection
                .ensure_prepared(txn_type, executor.prepared_sql())
                .and_then(|()| {
                    let session = self.connection.session()?;
                    executor.execute(session, rng)
                });

            match result {
                Ok(()) => return Outcome::Success,
                Err(ConnectionError::ShutdownRequested) => {
                    warn!(?txn_type, "benchmark shutting down, abandoning attempt");
                    return Outcome::Error;
                }
                Err(err) => match self.classify(&err) {
                    ErrorClass::Retry | ErrorClass::Unknown => {
                        let _ = self.connection.session().and_then(|s| s.rollback());
                        attempts += 1;
                        if attempts >= N_RETRY {
                            warn!(?txn_type, attempts, "retry cap exceeded, surfacing as error");
                            return Outcome::Error;
                        }
                        jittered_backoff();
                    }
                    ErrorClass::RetryDifferent => {
                        let _ = self.connection.session().and_then(|s| s.rollback());
                        return Outcome::RetryDifferent;
                    }
                    ErrorClass::UserAbort => {
                        return Outcome::UserAbort;
                    }
                    ErrorClass::Fatal => {
                        let _ = self.connection.session().and_then(|s| s.rollback());
                        error!(?txn_type, "fatal database error, tearing down session");
                        let _ = self.connection.reconnect();
                        return Outcome::Error;
                    }
                },
            }
        }
    }

    fn classify(&self, err: &ConnectionError) -> ErrorClass {
        match err.classifier_input() {
            Some((vendor_code, sqlstate)) => classifier::classify(RawError::new(vendor_code, sqlstate)),
            // Transport-level failures never reach the classifier table —
            // they are treated as retryable-with-reconnect at the call site.
            None => ErrorClass::Retry,
        }
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

fn jittered_backoff() {
    let jitter_ms = rand::rng().random_range(0..=5);
    trace!(jitter_ms, "retry backoff");
    std::thread::sleep(Duration::from_millis(jitter_ms));
}
