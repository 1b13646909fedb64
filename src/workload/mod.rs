//! # Workload state
//!
//! The per-workload coordinator: a rate-limited work queue, the wake/sleep
//! dance that keeps exactly `active_terminals` workers awake per phase, and
//! phase transitions.
//!
//! The work queue itself — pushes, pops, and its size counter — is
//! lock-free (`crossbeam::queue::SegQueue` plus an `AtomicUsize` kept in
//! lock-step, since the queue has no O(1) length of its own). The
//! `Mutex<PhaseSlot>` below guards only wait/notify coordination (who is
//! asleep, who is blocked on `fetch_work`, which phase is current) — it
//! never guards a data correctness invariant that the atomics already
//! uphold.
//!
//! Two distinct `Condvar`s share that one mutex, one per wake reason:
//! `queue_condvar` for workers parked in `fetch_rate_limited` waiting on
//! new work, `sleep_condvar` for workers parked in `stay_awake` waiting for
//! a phase transition. Spurious wakeups are fine within a condvar (every
//! waiter re-checks its own condition in a loop), but a wake *meant for one
//! reason* must never reach a waiter checking the other — `stay_awake`
//! decrements `worker_need_sleep` before waiting, so a wake from
//! `trim_and_wake` (unrelated to phase state) would otherwise let it return
//! "awake" without a phase transition ever happening.


use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crossbeam::queue::SegQueue;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, trace};

use crate::benchmark_state::{BenchmarkState, State};
use crate::phase::{Phase, RateMode};
use crate::transaction::{SubmittedProcedure, TraceReader};

/// Work enqueued beyond this depth is trimmed from the head — the policy is
/// "prefer freshness under overload", not "never drop".
pub const RATE_QUEUE_LIMIT: usize = 10_000;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("no phases configured for this workload")]
    NoPhases,
}

struct PhaseSlot {
    phase_idx: Option<usize>,
    workers_waiting: u32,
    workers_working: u32,
    worker_need_sleep: u32,
}

/// Coordinates one workload's phases, work queue, and worker wake/sleep
/// state. Shared by every [`crate::worker::Worker`] of that workload behind
/// an `Arc`.
pub struct WorkloadState {
    phases: Vec<Phase>,
    total_terminals: u32,
    queue: SegQueue<SubmittedProcedure>,
    queue_size: AtomicUsize,
    slot: Mutex<PhaseSlot>,
    /// Wakes workers parked in `fetch_rate_limited` when the queue gains
    /// work or the phase schedule moves on. Never touched by `stay_awake`.
    queue_condvar: Condvar,
    /// Wakes workers parked in `stay_awake`. Never touched by
    /// `trim_and_wake` — a queue-side wake must not let a sleeping worker
    /// observe a satisfied `worker_need_sleep` it already decremented.
    sleep_condvar: Condvar,
    benchmark_state: Arc<BenchmarkState>,
    trace: Option<Box<dyn TraceReader>>,
}

impl WorkloadState {
    pub fn new(
        phases: Vec<Phase>,
        total_terminals: u32,
        benchmark_state: Arc<BenchmarkState>,
        trace: Option<Box<dyn TraceReader>>,
    ) -> Result<Self, WorkloadError> {
        if phases.is_empty() {
            return Err(WorkloadError::NoPhases);
        }

        let first_active = phases.first().map(|p| p.active_terminals).unwrap_or(0);

        Ok(Self {
            phases,
            total_terminals,
            queue: SegQueue::new(),
            queue_size: AtomicUsize::new(0),
            slot: Mutex::new(PhaseSlot {
                phase_idx: Some(0),
                workers_waiting: 0,
                workers_working: 0,
                worker_need_sleep: total_terminals.saturating_sub(first_active),
            }),
            queue_condvar: Condvar::new(),
            sleep_condvar: Condvar::new(),
            benchmark_state,
            trace,
        })
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size.load(Ordering::Acquire)
    }

    fn current_phase(&self) -> Option<&Phase> {
        let idx = self.slot.lock().unwrap().phase_idx?;
        self.phases.get(idx)
    }

    /// The id of the phase currently in effect, or `None` if the workload
    /// has reached the end of its schedule.
    pub fn current_phase_id(&self) -> Option<u32> {
        self.current_phase().map(|p| p.id)
    }

    /// The rate mode of the phase currently in effect, consulted by the
    /// rate generator to decide whether and how fast to tick.
    pub fn current_rate_mode(&self) -> Option<RateMode> {
        self.current_phase().map(|p| p.mode)
    }

    fn push(&self, proc: SubmittedProcedure) {
        self.queue.push(proc);
        self.queue_size.fetch_add(1, Ordering::AcqRel);
    }

    fn pop(&self) -> Option<SubmittedProcedure> {
        let item = self.queue.pop();
        if item.is_some() {
            self.queue_size.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    fn drain(&self) {
        while self.pop().is_some() {}
    }

    /// Appends new work to the queue and wakes waiting workers.
    ///
    /// When `reset_queues` is set, the queue is drained first. Disabled,
    /// unlimited-rate, and serial phases never accept queued work — this is
    /// a no-op for them, since unlimited-rate and serial workers source
    /// their next transaction directly from the phase instead.
    pub fn add_to_queue(&self, amount: usize, reset_queues: bool, now_ns: u64) {
        if reset_queues {
            self.drain();
        }

        let Some(phase) = self.current_phase() else {
            return;
        };
        if phase.is_disabled() || phase.is_serial() || !phase.is_rate_limited() {
            return;
        }

        let state = self.benchmark_state.current();

        if let Some(trace) = &self.trace {
            if state != State::Warmup {
                for proc in trace.procedures_for(now_ns) {
                    self.push(proc);
                }
                self.trim_and_wake(amount);
                return;
            }
        }

        let mut rng = rand::rng();
        for _ in 0..amount {
            let txn_type = phase.sample_mix(&mut rng);
            self.push(SubmittedProcedure {
                txn_type,
                enqueued_at_ns: now_ns,
            });
        }

        self.trim_and_wake(amount);
    }

    fn trim_and_wake(&self, amount: usize) {
        while self.queue_size() > RATE_QUEUE_LIMIT {
            if self.pop().is_none() {
                break;
            }
        }

        let mut slot = self.slot.lock().unwrap();
        let to_wake = amount.min(slot.workers_waiting as usize);
        if to_wake > 0 {
            trace!(to_wake, "waking workers for freshly queued work");
            self.queue_condvar.notify_all();
        }
        let _ = slot.workers_waiting;
    }

    /// Returns the next unit of work for `worker_id`, or `None` when the
    /// worker should stop pulling work altogether.
    pub fn fetch_work(&self, worker_id: u32, rng: &mut impl Rng) -> Option<SubmittedProcedure> {
        let phase = self.current_phase()?;

        if phase.is_serial() {
            return self.fetch_serial(phase);
        }

        if !phase.is_rate_limited() {
            if phase.is_disabled() {
                return None;
            }
            let txn_type = phase.sample_mix(rng);
            return Some(SubmittedProcedure {
                txn_type,
                enqueued_at_ns: 0,
            });
        }

        self.fetch_rate_limited(worker_id)
    }

    fn fetch_serial(&self, phase: &Phase) -> Option<SubmittedProcedure> {
        loop {
            let state = self.benchmark_state.current();
            if state.is_terminal() {
                return None;
            }
            if state != State::LatencyComplete {
                break;
            }
            std::thread::yield_now();
        }
        Some(SubmittedProcedure {
            txn_type: phase.next_serial(),
            enqueued_at_ns: 0,
        })
    }

    fn fetch_rate_limited(&self, worker_id: u32) -> Option<SubmittedProcedure> {
        if let Some(item) = self.pop() {
            self.begin_work();
            return self.maybe_peek_back_for_warmup(item);
        }

        let mut slot = self.slot.lock().unwrap();
        slot.workers_waiting += 1;
        loop {
            if let Some(item) = self.pop() {
                slot.workers_waiting -= 1;
                drop(slot);
                self.begin_work();
                return self.maybe_peek_back_for_warmup(item);
            }
            if self.benchmark_state.current().is_terminal() || slot.phase_idx.is_none() {
                slot.workers_waiting -= 1;
                debug!(worker_id, "worker leaving fetch_work, benchmark terminal");
                return None;
            }
            slot = self.queue_condvar.wait(slot).unwrap();
        }
    }

    fn begin_work(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.workers_working += 1;
    }

    /// If a trace is attached and still in `WARMUP`, the polled item is not
    /// actually consumed: it is pushed back so the next caller sees it
    /// again. This is the peek primitive this core substitutes for the
    /// racy re-enqueue of the original driver (see DESIGN.md).
    fn maybe_peek_back_for_warmup(&self, item: SubmittedProcedure) -> Option<SubmittedProcedure> {
        if self.trace.is_some() && self.benchmark_state.current() == State::Warmup {
            self.push(item);
        }
        Some(item)
    }

    /// Must be called exactly once per `fetch_work` call that returned
    /// `Some`.
    pub fn finished_work(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.workers_working = slot.workers_working.saturating_sub(1);
    }

    /// Advances to the next phase, draining the queue and resetting the
    /// incoming phase's serial cursor. Returns the new phase, or `None` if
    /// the workload has reached its end.
    pub fn switch_to_next_phase(&self) -> Option<&Phase> {
        self.drain();

        let mut slot = self.slot.lock().unwrap();
        let next_idx = slot.phase_idx.map(|i| i + 1).unwrap_or(0);

        if next_idx >= self.phases.len() {
            slot.phase_idx = None;
            slot.worker_need_sleep = self.total_terminals;
            debug!("workload reached end of phase schedule");
            self.queue_condvar.notify_all();
            self.sleep_condvar.notify_all();
            return None;
        }

        let next_phase = &self.phases[next_idx];
        next_phase.reset_serial_cursor();
        slot.phase_idx = Some(next_idx);
        slot.worker_need_sleep = if next_phase.is_disabled() {
            self.total_terminals
        } else {
            self.total_terminals
                .saturating_sub(next_phase.active_terminals)
        };
        debug!(
            phase_id = next_phase.id,
            active_terminals = next_phase.active_terminals,
            "switched to next phase"
        );
        self.queue_condvar.notify_all();
        self.sleep_condvar.notify_all();
        Some(next_phase)
    }

    /// Called by a worker at the top of every iteration. Blocks while more
    /// workers need to go to sleep than are asleep, keeping exactly
    /// `active_terminals` awake for the current phase.
    ///
    /// Waits on its own condvar so a queue-side `notify_all` (new work
    /// arriving for workers parked in `fetch_rate_limited`) can never wake a
    /// sleeper here — only `switch_to_next_phase` and `signal_done` do.
    pub fn stay_awake(&self) {
        let mut slot = self.slot.lock().unwrap();
        while slot.worker_need_sleep > 0 {
            slot.worker_need_sleep -= 1;
            slot = self.sleep_condvar.wait(slot).unwrap();
        }
    }

    /// Wakes every waiter — both sleeping workers and rate-limited
    /// fetchers — so they can observe a terminal benchmark state.
    pub fn signal_done(&self) {
        self.queue_condvar.notify_all();
        self.sleep_condvar.notify_all();
    }

    #[cfg(test)]
    fn workers_waiting(&self) -> u32 {
        self.slot.lock().unwrap().workers_waiting
    }

    #[cfg(test)]
    fn workers_working(&self) -> u32 {
        self.slot.lock().unwrap().workers_working
    }
}
