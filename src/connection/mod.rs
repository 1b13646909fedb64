//! # Connection management
//!
//! Defines the capability surface a [`crate::worker::Worker`] needs from a
//! database session, and a [`ConnectionManager`] that establishes one,
//! tears it down on fatal or transport failure, and reconnects with capped
//! exponential backoff. The concrete driver behind [`Session`] is always an
//! external collaborator; this module ships only the seam and, under
//! `#[cfg(test)]`, an in-memory mock that never touches a network.

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::benchmark_state::BenchmarkState;
use crate::transaction::TransactionType;

/// Errors a [`Session`] or [`SessionFactory`] can report.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("database error: vendor_code={vendor_code}, sqlstate={sqlstate:?}: {message}")]
    Database {
        vendor_code: i64,
        sqlstate: Option<String>,
        message: String,
    },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("session is closed")]
    Closed,
    #[error("benchmark is shutting down, abandoning reconnect")]
    ShutdownRequested,
}

impl ConnectionError {
    /// Extracts the `(vendor_code, sqlstate)` pair this error should be
    /// classified on, when it is a database-level error. Transport,
    /// closed-session, and shutdown failures are not classifier inputs —
    /// the worker handles them directly at the call site instead.
    pub fn classifier_input(&self) -> Option<(i64, Option<&str>)> {
        match self {
            ConnectionError::Database {
                vendor_code,
                sqlstate,
                ..
            } => Some((*vendor_code, sqlstate.as_deref())),
            ConnectionError::Transport(_)
            | ConnectionError::Closed
            | ConnectionError::ShutdownRequested => None,
        }
    }
}

/// A live (or failed) database session, prepared-statement cache included.
///
/// Implementations are per-dialect drivers, out of scope here. Autocommit is
/// expected to be off for the lifetime of a transaction body; the worker
/// calls `rollback` explicitly on any non-success outcome.
pub trait Session: Send {
    fn execute(&mut self, statement_key: TransactionType, sql: &str) -> Result<(), ConnectionError>;
    fn prepare(&mut self, statement_key: TransactionType, sql: &str) -> Result<(), ConnectionError>;
    fn rollback(&mut self) -> Result<(), ConnectionError>;
    fn close(&mut self);
    fn is_closed(&self) -> bool;
}

/// Produces a fresh [`Session`] for a given dialect and connection string.
/// The only thing a [`ConnectionManager`] knows about its driver.
pub trait SessionFactory: Send + Sync {
    fn connect(&self, url: &str) -> Result<Box<dyn Session>, ConnectionError>;
}

/// Backoff ceiling steps used on reconnect, in order; the last entry repeats
/// once exhausted.
const BACKOFF_STEPS_MS: [u64; 5] = [50, 100, 250, 500, 1000];

/// Owns one worker's session, transparently reconnecting on fatal or
/// transport failure with capped exponential backoff, and caches which
/// transaction types have already had their statement prepared on the
/// current session.
pub struct ConnectionManager {
    factory: Box<dyn SessionFactory>,
    url: String,
    session: Option<Box<dyn Session>>,
    reconnect_attempts: u32,
    /// Transaction types whose statement is prepared on the live session.
    /// Cleared whenever the session is torn down, since a prepared
    /// statement does not survive a reconnect.
    prepared: HashSet<TransactionType>,
    /// Consulted at the top of every `reconnect` loop iteration so a worker
    /// stuck reconnecting after the benchmark has finished unwinds instead
    /// of retrying forever.
    shutdown: Arc<BenchmarkState>,
}

impl ConnectionManager {
    pub fn new(
        factory: Box<dyn SessionFactory>,
        url: impl Into<String>,
        shutdown: Arc<BenchmarkState>,
    ) -> Self {
        Self {
            factory,
            url: url.into(),
            session: None,
            reconnect_attempts: 0,
            prepared: HashSet::new(),
            shutdown,
        }
    }

    /// Establishes the initial session. Called once at worker start.
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        self.session = Some(self.factory.connect(&self.url)?);
        self.reconnect_attempts = 0;
        self.prepared.clear();
        Ok(())
    }

    /// Returns the live session, reconnecting first if none is held or the
    /// held one reports itself closed.
    pub fn session(&mut self) -> Result<&mut dyn Session, ConnectionError> {
        let needs_reconnect = match &self.session {
            None => true,
            Some(s) => s.is_closed(),
        };
        if needs_reconnect {
            self.reconnect()?;
        }
        Ok(self.session.as_deref_mut().expect("just (re)connected"))
    }

    /// Prepares `sql` under `key` on the live session, unless it was already
    /// prepared since the last (re)connect.
    pub fn ensure_prepared(&mut self, key: TransactionType, sql: &str) -> Result<(), ConnectionError> {
        if self.prepared.contains(&key) {
            return Ok(());
        }
        self.session()?.prepare(key, sql)?;
        self.prepared.insert(key);
        Ok(())
    }

    /// Tears down the current session (if any) and reconnects with capped
    /// exponential backoff. Retries unboundedly unless the benchmark has
    /// reached a terminal state, in which case this gives up and returns
    /// [`ConnectionError::ShutdownRequested`].
    pub fn reconnect(&mut self) -> Result<(), ConnectionError> {
        if let Some(mut s) = self.session.take() {
            s.close();
        }
        self.prepared.clear();

        loop {
            if self.shutdown.current().is_terminal() {
                warn!("benchmark state is terminal, abandoning reconnect");
                return Err(ConnectionError::ShutdownRequested);
            }

            match self.factory.connect(&self.url) {
                Ok(session) => {
                    debug!(attempts = self.reconnect_attempts, "session reconnected");
                    self.session = Some(session);
                    self.reconnect_attempts = 0;
                    return Ok(());
                }
                Err(err) => {
                    let step = BACKOFF_STEPS_MS
                        [(self.reconnect_attempts as usize).min(BACKOFF_STEPS_MS.len() - 1)];
                    warn!(
                        attempt = self.reconnect_attempts,
                        backoff_ms = step,
                        error = %err,
                        "reconnect attempt failed, backing off"
                    );
                    self.reconnect_attempts += 1;
                    std::thread::sleep(Duration::from_millis(step));
                }
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(mut s) = self.session.take() {
            s.close();
        }
        self.prepared.clear();
    }
}
