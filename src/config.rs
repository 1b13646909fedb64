//! # Configuration
//!
//! Plain data describing one benchmark run, as already parsed and validated
//! by an external collaborator (XML/CLI loading is out of scope here). The
//! orchestrator only ever consumes a [`BenchmarkConfig`] value — it never
//! reads a file or an environment variable itself.

use std::path::PathBuf;
use std::time::Duration;

use crate::phase::{Phase, WeightedEntry};

/// Which relational database dialect a [`BenchmarkConfig`] targets. The
/// dialect only selects a [`crate::connection::SessionFactory`]; it never
/// branches transaction logic inside this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Oracle,
    Db2,
    SqlServer,
    Tibero,
}

/// Isolation level requested for transaction bodies. TPC-C defaults to
/// `Serializable`; a phase may override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::Serializable
    }
}

/// Connection credentials and target for a benchmark run.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub dialect: Dialect,
    pub url: String,
    pub username: String,
    pub password: String,
    pub isolation: IsolationLevel,
}

/// Terminal population for a run: how many virtual terminals exist in
/// total, independent of how many are active in any given phase.
#[derive(Debug, Clone, Copy)]
pub struct TerminalsConfig {
    pub total_terminals: u32,
}

/// Which invoker actions this run should perform, mirroring the shell-level
/// `drive -b <benchmark> -c <config> [--create] [--load] [--execute]
/// [--clear]` flag set. Parsing those flags is out of scope here; this is
/// the plain data a CLI loader would produce. Flags compose freely — a
/// single invocation may request more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunMode {
    /// Create the benchmark's schema before anything else runs.
    pub create: bool,
    /// Load initial data into the schema.
    pub load: bool,
    /// Drive the configured phase schedule. The orchestrator does nothing
    /// at all unless this is set.
    pub execute: bool,
    /// Tear down (drop) the schema after the run.
    pub clear: bool,
}

impl RunMode {
    /// `--create --load --execute`: the conventional "set up and run".
    pub fn create_load_execute() -> Self {
        Self {
            create: true,
            load: true,
            execute: true,
            clear: false,
        }
    }

    /// `--execute` only: run the workload against an already-populated
    /// schema.
    pub fn execute_only() -> Self {
        Self {
            execute: true,
            ..Self::default()
        }
    }
}

/// One phase's configuration input, consumed to build a [`Phase`] value.
#[derive(Debug, Clone)]
pub struct PhaseConfig {
    pub id: u32,
    pub mix: Vec<WeightedEntry>,
    pub active_terminals: u32,
    pub mode: crate::phase::RateMode,
    pub duration: Duration,
}

impl PhaseConfig {
    pub fn into_phase(self) -> Phase {
        Phase::new(self.id, self.mix, self.active_terminals, self.mode, self.duration)
    }
}

/// The full, already-validated configuration for one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub benchmark_name: String,
    pub connection: ConnectionConfig,
    pub terminals: TerminalsConfig,
    pub phases: Vec<PhaseConfig>,
    /// Path to a recorded workload trace, if replaying one instead of
    /// sampling each phase's weighted mix.
    pub trace_path: Option<PathBuf>,
    /// Where to append the real-time results stream.
    pub results_path: PathBuf,
    /// Which invoker actions this run performs.
    pub mode: RunMode,
    /// `--runscript <path>`: run this SQL script and exit before the
    /// workload loop, bypassing the phase schedule entirely. Loading and
    /// executing the script is an external collaborator's job; the
    /// orchestrator only knows to skip its own run when this is set.
    pub runscript_path: Option<PathBuf>,
}
