use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

use super::*;
use crate::connection::{Session, SessionFactory};
use crate::phase::{Phase, RateMode, WeightedEntry};

fn init_tracing() {
    let _ = Subscriber::builder().with_max_level(Level::TRACE).try_init();
}

struct MockSession;

impl Session for MockSession {
    fn execute(&mut self, _key: TransactionType, _sql: &str) -> Result<(), ConnectionError> {
        Ok(())
    }
    fn prepare(&mut self, _key: TransactionType, _sql: &str) -> Result<(), ConnectionError> {
        Ok(())
    }
    fn rollback(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }
    fn close(&mut self) {}
    fn is_closed(&self) -> bool {
        false
    }
}

struct MockFactory;
impl SessionFactory for MockFactory {
    fn connect(&self, _url: &str) -> Result<Box<dyn Session>, ConnectionError> {
        Ok(Box::new(MockSession))
    }
}

/// An executor whose outcome is scripted: always succeeds, always fails
/// with a given classification, or fails `n` times then succeeds.
struct ScriptedExecutor {
    remaining_failures: AtomicU32,
    vendor_code: i64,
    sqlstate: Option<String>,
    calls: AtomicU32,
}

impl ScriptedExecutor {
    fn always_succeeds() -> Self {
        Self {
            remaining_failures: AtomicU32::new(0),
            vendor_code: 0,
            sqlstate: None,
            calls: AtomicU32::new(0),
        }
    }

    fn fails_n_times_then_succeeds(n: u32, vendor_code: i64, sqlstate: &str) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
            vendor_code,
            sqlstate: Some(sqlstate.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    fn always_fails(vendor_code: i64, sqlstate: &str) -> Self {
        Self {
            remaining_failures: AtomicU32::new(u32::MAX),
            vendor_code,
            sqlstate: Some(sqlstate.to_string()),
            calls: AtomicU32::new(0),
        }
    }
}

impl TxnExecutor for ScriptedExecutor {
    fn execute(
        &self,
        _session: &mut dyn Session,
        _rng: &mut rand::rngs::ThreadRng,
    ) -> Result<(), ConnectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.remaining_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionError::Database {
                vendor_code: self.vendor_code,
                sqlstate: self.sqlstate.clone(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

struct VecSink(Arc<Mutex<Vec<LatencySample>>>);
impl SampleSink for VecSink {
    fn record(&mut self, sample: LatencySample) {
        self.0.lock().unwrap().push(sample);
    }
}

fn single_txn_phase() -> Phase {
    Phase::new(
        0,
        vec![WeightedEntry {
            txn_type: TransactionType(1),
            weight: 1,
        }],
        1,
        RateMode::UnlimitedRate,
        Duration::from_secs(1),
    )
}

fn build_worker(
    executor: Arc<dyn TxnExecutor>,
) -> (Worker, Arc<Mutex<Vec<LatencySample>>>) {
    let bstate = Arc::new(BenchmarkState::new(1));
    bstate.skip_warmup();
    let workload = Arc::new(
        WorkloadState::new(vec![single_txn_phase()], 1, Arc::clone(&bstate), None)
            .expect("valid workload"),
    );
    let connection = ConnectionManager::new(Box::new(MockFactory), "mock://db", Arc::clone(&bstate));

    let mut executors = HashMap::new();
    executors.insert(TransactionType(1), executor);

    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Box::new(VecSink(Arc::clone(&recorded)));

    (
        Worker::new(0, workload, bstate, connection, executors, sink),
        recorded,
    )
}

/// # Scenario
/// A transaction that always succeeds produces exactly one
/// `Outcome::Success` sample and no retries.
#[test]
fn successful_transaction_records_success_once() {
    init_tracing();
    let (worker, recorded) = build_worker(Arc::new(ScriptedExecutor::always_succeeds()));
    let samples = worker.run().expect("worker should not error");

    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].outcome, Outcome::Success);
    assert_eq!(recorded.lock().unwrap().len(), 1);
}

/// # Scenario
/// A transaction that fails with a retryable classification a few times
/// then succeeds still reports `Outcome::Success` for that attempt, since
/// retries are internal to the attempt loop.
#[test]
fn retryable_failures_resolve_to_success_within_cap() {
    init_tracing();
    let (worker, _) = build_worker(Arc::new(ScriptedExecutor::fails_n_times_then_succeeds(
        3, 1213, "40001",
    )));
    let samples = worker.run().expect("worker should not error");

    assert_eq!(samples[0].outcome, Outcome::Success);
}

/// # Scenario
/// A transaction that always fails with a retryable classification is
/// surfaced as `Outcome::Error` once the retry cap is exceeded, rather than
/// looping forever.
#[test]
fn retry_cap_is_enforced() {
    init_tracing();
    let (worker, _) = build_worker(Arc::new(ScriptedExecutor::always_fails(1213, "40001")));
    let samples = worker.run().expect("worker should not error");

    assert_eq!(samples[0].outcome, Outcome::Error);
}

/// # Scenario
/// A PostgreSQL out-of-memory error is fatal: the worker surfaces it as an
/// error immediately, without retrying.
#[test]
fn fatal_error_surfaces_immediately() {
    init_tracing();
    let (worker, _) = build_worker(Arc::new(ScriptedExecutor::always_fails(0, "53200")));
    let samples = worker.run().expect("worker should not error");

    assert_eq!(samples[0].outcome, Outcome::Error);
}
