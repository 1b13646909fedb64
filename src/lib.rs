//! # tpcc-driver-core
//!
//! The concurrency core of a multi-DBMS transactional workload generator — a
//! driver that runs a TPC-C style OLTP benchmark against heterogeneous
//! relational database systems over a common pooled-session protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                          │
//! │  ┌────────────┐   ┌───────────────┐   ┌───────────────────┐  │
//! │  │  Phases    │──▶│ BenchmarkState│   │  Results summary  │  │
//! │  └────────────┘   └───────┬───────┘   │  (stats + hist.)  │  │
//! │                           │           └─────────▲─────────┘  │
//! │                   ┌───────▼────────┐            │            │
//! │                   │ WorkloadState  │   merges LatencySamples  │
//! │                   │ (rate queue)   │────────────┘            │
//! │                   └───────┬────────┘                         │
//! │         ┌─────────────────┼─────────────────┐                │
//! │     ┌───▼───┐         ┌───▼───┐         ┌───▼───┐            │
//! │     │Worker │         │Worker │   ...   │Worker │            │
//! │     │(+Conn)│         │(+Conn)│         │(+Conn)│            │
//! │     └───────┘         └───────┘         └───────┘            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`classifier`] | Pure `(vendor_code, sqlstate) -> ErrorClass` mapping |
//! | [`stats`] | Distribution statistics over a latency sample |
//! | [`histogram`] | Lock-free outcome counters keyed by transaction type |
//! | [`phase`] | Immutable per-stage transaction mix, rate mode, and duration |
//! | [`benchmark_state`] | Process-wide lifecycle state machine |
//! | [`workload`] | Rate-limited work queue and worker wait/wake coordination |
//! | [`connection`] | Per-worker session with reconnect and statement caching |
//! | [`transaction`] | External collaborator contracts: executors, trace readers |
//! | [`worker`] | Virtual terminal attempt/retry/abort loop |
//! | [`results`] | Real-time results stream and end-of-phase summary |
//! | [`orchestrator`] | Builds workers, drives phases, collects results |
//! | [`config`] | Plain configuration data consumed by the orchestrator |
//!
//! ## Key properties
//!
//! - **Rate-governed scheduling** — a lock-free MPMC queue with an atomic
//!   size counter feeds workers at a configured transactions-per-second
//!   target, trimming from the head under overload to prefer freshness.
//! - **At-most-once accounting** — every `fetch_work` that returns work is
//!   matched by exactly one `finished_work` and exactly one latency sample,
//!   regardless of how many retries the attempt took internally.
//! - **Dialect-agnostic workers** — a worker depends only on the small
//!   [`connection::Session`] capability set and the pure
//!   [`classifier::classify`] function, never on a per-DBMS class hierarchy.
//! - **Phase transitions as a happens-before barrier** — all queued work for
//!   the outgoing phase is discarded before workers observe the new one.

#![allow(dead_code)]

pub mod benchmark_state;
pub mod classifier;
pub mod config;
pub mod connection;
pub mod histogram;
pub mod orchestrator;
pub mod phase;
pub mod results;
pub mod stats;
pub mod transaction;
pub mod worker;
pub mod workload;
