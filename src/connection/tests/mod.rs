use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

use super::*;
use crate::benchmark_state::BenchmarkState;

fn init_tracing() {
    let _ = Subscriber::builder().with_max_level(Level::TRACE).try_init();
}

fn live_shutdown() -> Arc<BenchmarkState> {
    Arc::new(BenchmarkState::new(1))
}

/// An in-memory session that records every statement it was asked to
/// execute or prepare and can be told to report itself closed. `prepares`
/// is shared across reconnects so a test can observe the total prepare
/// count independent of which session instance handled it.
struct MockSession {
    closed: bool,
    executed: Vec<TransactionType>,
    prepares: Arc<Mutex<Vec<TransactionType>>>,
}

impl Session for MockSession {
    fn execute(&mut self, key: TransactionType, _sql: &str) -> Result<(), ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        self.executed.push(key);
        Ok(())
    }

    fn prepare(&mut self, key: TransactionType, _sql: &str) -> Result<(), ConnectionError> {
        self.prepares.lock().unwrap().push(key);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// A factory that fails `fail_count` times before producing a working
/// session, used to exercise reconnect backoff without a real sleep-heavy
/// test.
struct FlakyFactory {
    fail_count: AtomicU32,
    connects: Mutex<u32>,
    prepares: Arc<Mutex<Vec<TransactionType>>>,
}

impl FlakyFactory {
    fn new(fail_count: u32) -> Self {
        Self {
            fail_count: AtomicU32::new(fail_count),
            connects: Mutex::new(0),
            prepares: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl SessionFactory for FlakyFactory {
    fn connect(&self, _url: &str) -> Result<Box<dyn Session>, ConnectionError> {
        *self.connects.lock().unwrap() += 1;
        if self.fail_count.load(Ordering::SeqCst) > 0 {
            self.fail_count.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionError::Transport("connection refused".into()));
        }
        Ok(Box::new(MockSession {
            closed: false,
            executed: vec![],
            prepares: Arc::clone(&self.prepares),
        }))
    }
}

/// # Scenario
/// A factory that succeeds immediately connects on the first attempt.
#[test]
fn connect_succeeds_immediately() {
    init_tracing();
    let mut mgr = ConnectionManager::new(Box::new(FlakyFactory::new(0)), "mock://db", live_shutdown());
    mgr.connect().expect("should connect");
    assert!(!mgr.session().unwrap().is_closed());
}

/// # Scenario
/// `reconnect` retries through transport failures and eventually succeeds,
/// without surfacing any of the intermediate errors to the caller.
#[test]
fn reconnect_retries_past_transient_failures() {
    init_tracing();
    let mut mgr = ConnectionManager::new(Box::new(FlakyFactory::new(3)), "mock://db", live_shutdown());
    mgr.reconnect().expect("should eventually reconnect");
    assert!(!mgr.session().unwrap().is_closed());
}

/// # Scenario
/// Once the benchmark state is terminal, `reconnect` gives up immediately
/// instead of retrying forever.
#[test]
fn reconnect_gives_up_once_benchmark_is_terminal() {
    init_tracing();
    let shutdown = Arc::new(BenchmarkState::new(1));
    shutdown.skip_warmup();
    shutdown.signal_done();

    let mut mgr = ConnectionManager::new(Box::new(FlakyFactory::new(0)), "mock://db", shutdown);
    let err = mgr.reconnect().expect_err("should not retry past shutdown");
    assert!(matches!(err, ConnectionError::ShutdownRequested));
}

/// # Scenario
/// Calling `session()` after the held session reports itself closed
/// transparently reconnects rather than returning the stale handle.
#[test]
fn session_reconnects_when_held_session_is_closed() {
    init_tracing();
    let mut mgr = ConnectionManager::new(Box::new(FlakyFactory::new(0)), "mock://db", live_shutdown());
    mgr.connect().unwrap();
    mgr.session().unwrap().close();

    let s = mgr.session().expect("should transparently reconnect");
    assert!(!s.is_closed());
}

/// # Scenario
/// `ensure_prepared` calls `Session::prepare` exactly once per transaction
/// type per connection, and a reconnect invalidates the cache so the next
/// call prepares again.
#[test]
fn ensure_prepared_caches_per_connection_and_resets_on_reconnect() {
    init_tracing();
    let factory = FlakyFactory::new(0);
    let prepares = Arc::clone(&factory.prepares);
    let mut mgr = ConnectionManager::new(Box::new(factory), "mock://db", live_shutdown());
    mgr.connect().unwrap();

    let key = TransactionType(1);
    mgr.ensure_prepared(key, "select 1").unwrap();
    mgr.ensure_prepared(key, "select 1").unwrap();
    assert_eq!(prepares.lock().unwrap().len(), 1, "second call should hit the cache");

    mgr.reconnect().unwrap();
    mgr.ensure_prepared(key, "select 1").unwrap();
    assert_eq!(
        prepares.lock().unwrap().len(),
        2,
        "reconnect should invalidate the cache"
    );
}

/// # Scenario
/// A database-level error carries its classifier input through unchanged;
/// a transport failure carries none, signalling the worker to treat it as
/// unconditional reconnect-and-retry.
#[test]
fn classifier_input_distinguishes_database_from_transport_errors() {
    init_tracing();
    let db_err = ConnectionError::Database {
        vendor_code: 1213,
        sqlstate: Some("40001".to_string()),
        message: "deadlock".to_string(),
    };
    assert_eq!(db_err.classifier_input(), Some((1213, Some("40001"))));

    let transport_err = ConnectionError::Transport("reset".to_string());
    assert_eq!(transport_err.classifier_input(), None);
}
