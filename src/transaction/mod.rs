//! # Transaction contracts
//!
//! The small set of traits and identifiers through which this crate talks to
//! its external collaborators: the concrete TPC-C transaction bodies and any
//! trace-driven workload replay. Neither is implemented here — this module
//! only defines the seam.

use std::time::Duration;

use rand::rngs::ThreadRng;

use crate::connection::{ConnectionError, Session};

/// Identifies one of the benchmark's transaction kinds. Kept as a small
/// opaque id rather than an enum so that this core stays usable for
/// benchmarks beyond TPC-C's five transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionType(pub u16);

/// A unit of work produced by the rate generator or chosen directly by a
/// worker: "run transaction type `txn_type`", timestamped at enqueue time.
#[derive(Debug, Clone, Copy)]
pub struct SubmittedProcedure {
    pub txn_type: TransactionType,
    pub enqueued_at_ns: u64,
}

/// How one attempt of a transaction body concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    Success,
    UserAbort,
    Retry,
    RetryDifferent,
    Error,
    Skipped,
}

/// A single recorded transaction attempt, ready to be appended to the
/// results stream and folded into end-of-phase statistics.
#[derive(Debug, Clone, Copy)]
pub struct LatencySample {
    pub worker_id: u32,
    pub phase_id: u32,
    pub txn_type: TransactionType,
    pub start_ns: u64,
    pub end_ns: u64,
    pub outcome: Outcome,
}

impl LatencySample {
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.end_ns.saturating_sub(self.start_ns))
    }
}

/// Executes one transaction body against a session.
///
/// Implementations are the (out-of-scope) concrete TPC-C transactions —
/// NewOrder, Payment, OrderStatus, Delivery, StockLevel — or any other
/// benchmark's bodies. A `Session` error is returned unclassified; the
/// worker is responsible for running it through
/// [`crate::classifier::classify`].
pub trait TxnExecutor: Send + Sync {
    fn execute(
        &self,
        session: &mut dyn Session,
        rng: &mut ThreadRng,
    ) -> Result<(), ConnectionError>;

    /// The statement text the worker should prepare once per connection,
    /// before the first execution of this transaction type, and cache
    /// until the next reconnect. Bodies that build their statement text
    /// entirely inside `execute`, or that have nothing worth preparing,
    /// can leave this at its default.
    fn prepared_sql(&self) -> &str {
        ""
    }
}

/// An optional trace-driven source of work, used instead of the phase's
/// weighted-mix sampler when a recorded workload trace is attached.
pub trait TraceReader: Send + Sync {
    /// Procedures that should have been submitted by wall-clock time
    /// `now_ns`, since the trace was last consulted.
    fn procedures_for(&self, now_ns: u64) -> Vec<SubmittedProcedure>;

    /// Whether the trace has no more procedures for the current phase.
    fn phase_complete(&self) -> bool;
}
