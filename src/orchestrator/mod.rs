//! # Orchestrator
//!
//! Builds the [`BenchmarkState`] and [`WorkloadState`] for a run, spawns one
//! [`Worker`] thread per terminal plus a rate-generator thread, drives the
//! phase schedule, and collects results into a [`PhaseSummary`] per phase.
//!
//! This is the one module that owns process-lifetime threads; everything it
//! spawns is joined before `run` returns, successfully or not.


use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info};

use crate::benchmark_state::BenchmarkState;
use crate::config::BenchmarkConfig;
use crate::connection::{ConnectionError, ConnectionManager, SessionFactory};
use crate::phase::RateMode;
use crate::results::{PhaseSummary, ResultsError, ResultsWriter};
use crate::transaction::{LatencySample, TraceReader, TransactionType, TxnExecutor};
use crate::worker::{SampleSink, Worker, WorkerError};
use crate::workload::{WorkloadError, WorkloadState};

/// How often the rate generator wakes up to top off the work queue.
const TICK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Workload(#[from] WorkloadError),
    #[error("worker {worker_id} failed: {source}")]
    Worker {
        worker_id: u32,
        #[source]
        source: WorkerError,
    },
    #[error(transparent)]
    Results(#[from] ResultsError),
    #[error("initial connection failed: {0}")]
    InitialConnection(#[from] ConnectionError),
}

/// A writer shared by every worker, serializing concurrent appends to the
/// results stream behind a `Mutex` — appends are infrequent relative to
/// transaction execution, so lock contention here is not on the hot path.
struct SharedResultsSink(Arc<Mutex<ResultsWriter>>);

impl SampleSink for SharedResultsSink {
    fn record(&mut self, sample: LatencySample) {
        if let Err(err) = self.0.lock().unwrap().append(sample) {
            tracing::error!(%err, "failed to append results row");
        }
    }
}

/// Drives one benchmark run end to end.
pub struct Orchestrator {
    config: BenchmarkConfig,
    factory: Box<dyn SessionFactory>,
    executors: HashMap<TransactionType, Arc<dyn TxnExecutor>>,
    trace: Option<Box<dyn TraceReader>>,
}

impl Orchestrator {
    pub fn new(
        config: BenchmarkConfig,
        factory: Box<dyn SessionFactory>,
        executors: HashMap<TransactionType, Arc<dyn TxnExecutor>>,
        trace: Option<Box<dyn TraceReader>>,
    ) -> Self {
        Self {
            config,
            factory,
            executors,
            trace,
        }
    }

    /// Runs the full benchmark: spawns workers and a rate generator, drives
    /// the phase schedule to completion, and returns one [`PhaseSummary`]
    /// per configured phase, in schedule order.
    pub fn run(self) -> Result<Vec<PhaseSummary>, OrchestratorError> {
        if self.config.runscript_path.is_some() {
            info!("runscript configured, skipping phase schedule entirely");
            return Ok(Vec::new());
        }
        if !self.config.mode.execute {
            info!(mode = ?self.config.mode, "execute not requested, nothing to run");
            return Ok(Vec::new());
        }

        let total_terminals = self.config.terminals.total_terminals;
        let durations: Vec<Duration> = self.config.phases.iter().map(|p| p.duration).collect();
        let phase_ids: Vec<u32> = self.config.phases.iter().map(|p| p.id).collect();
        let phases = self
            .config
            .phases
            .into_iter()
            .map(|p| p.into_phase())
            .collect();

        let benchmark_state = Arc::new(BenchmarkState::new(total_terminals));
        let workload = Arc::new(WorkloadState::new(
            phases,
            total_terminals,
            Arc::clone(&benchmark_state),
            self.trace,
        )?);

        let results = Arc::new(Mutex::new(ResultsWriter::create(&self.config.results_path)?));

        let factory: Arc<dyn SessionFactory> = Arc::from(self.factory);
        let executors = Arc::new(self.executors);

        let worker_handles: Vec<_> = (0..total_terminals)
            .map(|id| {
                let workload = Arc::clone(&workload);
                let benchmark_state = Arc::clone(&benchmark_state);
                let url = self.config.connection.url.clone();
                let factory = Arc::clone(&factory);
                let executors = Arc::clone(&executors);
                let sink = Box::new(SharedResultsSink(Arc::clone(&results)));

                thread::spawn(move || {
                    let connection = ConnectionManager::new(
                        ArcFactory(factory).boxed(),
                        url,
                        Arc::clone(&benchmark_state),
                    );
                    let worker = Worker::new(
                        id,
                        workload,
                        benchmark_state,
                        connection,
                        (*executors).clone(),
                        sink,
                    );
                    worker.run()
                })
            })
            .collect();

        let rate_handle = {
            let workload = Arc::clone(&workload);
            let durations = durations.clone();
            thread::spawn(move || run_rate_generator(workload, durations))
        };

        rate_handle.join().expect("rate generator thread panicked");

        let mut all_samples: Vec<LatencySample> = Vec::new();
        for (id, handle) in worker_handles.into_iter().enumerate() {
            let samples = handle
                .join()
                .expect("worker thread panicked")
                .map_err(|source| OrchestratorError::Worker {
                    worker_id: id as u32,
                    source,
                })?;
            all_samples.extend(samples);
        }

        info!(total_samples = all_samples.len(), "benchmark run complete");
        benchmark_state.exit();

        Ok(phase_ids
            .into_iter()
            .map(|phase_id| {
                let phase_samples: Vec<LatencySample> = all_samples
                    .iter()
                    .copied()
                    .filter(|s| s.phase_id == phase_id)
                    .collect();
                PhaseSummary::from_samples(phase_id, &phase_samples)
            })
            .collect())
    }
}

/// Wraps a shared `Arc<dyn SessionFactory>` so it can be handed to a
/// per-worker `ConnectionManager`, which expects to own its factory.
struct ArcFactory(Arc<dyn SessionFactory>);

impl ArcFactory {
    fn boxed(self) -> Box<dyn SessionFactory> {
        Box::new(self)
    }
}

impl SessionFactory for ArcFactory {
    fn connect(&self, url: &str) -> Result<Box<dyn crate::connection::Session>, ConnectionError> {
        self.0.connect(url)
    }
}

/// Drives the phase schedule: for each phase in order, ticks the work queue
/// at its configured rate (if rate-limited) for the phase's duration, then
/// advances to the next one. After the last phase, advances once more so
/// `WorkloadState` observes the end of the schedule and wakes every worker
/// to exit.
fn run_rate_generator(workload: Arc<WorkloadState>, durations: Vec<Duration>) {
    for (i, duration) in durations.into_iter().enumerate() {
        if i > 0 {
            workload.switch_to_next_phase();
        }
        debug!(phase_index = i, ?duration, "rate generator entering phase");
        run_phase_ticks(&workload, duration);
    }

    // Reaching the end of the schedule sets the workload's phase to `None`;
    // `fetch_work` then returns `None` to every worker on its own, and each
    // worker reports itself via `BenchmarkState::signal_done` as it exits.
    // The rate generator only needs to wake anyone parked waiting on work.
    workload.switch_to_next_phase();
    workload.signal_done();
}

fn run_phase_ticks(workload: &WorkloadState, duration: Duration) {
    let deadline = std::time::Instant::now() + duration;
    while std::time::Instant::now() < deadline {
        if let Some(RateMode::RateLimited { rps }) = workload.current_rate_mode() {
            let amount = ((rps as f64) * TICK_INTERVAL.as_secs_f64()).round().max(1.0) as usize;
            workload.add_to_queue(amount, false, now_ns());
        }
        thread::sleep(TICK_INTERVAL);
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}
