//! Virtual terminal: one long-lived execution loop per simulated client.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use oltpbench_core::{
    OutcomeKind, Phase, TransactionExecutor, TransactionRequest, TransactionStatus,
    TransactionType, WorkloadConfiguration,
};
use oltpbench_results::OutcomeAccumulator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, trace};

use crate::arrival::{terminal_seed, ArrivalController, NextArrival, SELECTION_STREAM};
use crate::clock::RunClock;
use crate::dispatcher::{ActivePhase, PhaseSignal};
use crate::error::DriverError;
use crate::selector::{Selection, TransactionSelector};

/// Lifecycle of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum WorkerState {
    Initializing = 0,
    Warmup = 1,
    Measure = 2,
    /// Waiting for the next phase (inactive, disabled, or pass complete).
    Idle = 3,
    Done = 4,
    Terminated = 5,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initializing,
            1 => Self::Warmup,
            2 => Self::Measure,
            3 => Self::Idle,
            4 => Self::Done,
            _ => Self::Terminated,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initializing => "INITIALIZING",
            Self::Warmup => "WARMUP",
            Self::Measure => "MEASURE",
            Self::Idle => "IDLE",
            Self::Done => "DONE",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(label)
    }
}

/// Lock-free progress counters of one terminal, read by the progress monitor.
#[derive(Debug)]
pub struct WorkerProgress {
    terminal: usize,
    measured: [AtomicU64; 4],
    warmup: AtomicU64,
    state: AtomicU8,
}

impl WorkerProgress {
    #[must_use]
    pub fn new(terminal: usize) -> Self {
        Self {
            terminal,
            measured: Default::default(),
            warmup: AtomicU64::new(0),
            state: AtomicU8::new(WorkerState::Initializing as u8),
        }
    }

    #[must_use]
    pub fn terminal(&self) -> usize {
        self.terminal
    }

    pub fn record(&self, kind: OutcomeKind, warmup: bool) {
        if warmup {
            self.warmup.fetch_add(1, Ordering::Relaxed);
        } else {
            self.measured[kind.index()].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Measured attempts with `kind`.
    #[must_use]
    pub fn measured(&self, kind: OutcomeKind) -> u64 {
        self.measured[kind.index()].load(Ordering::Relaxed)
    }

    /// Every attempt, warmup included.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        let measured: u64 = self
            .measured
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum();
        measured + self.warmup.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }
}

/// Sent when a terminal can contribute nothing more to a phase: its serial
/// pass completed or the trace ran dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PhaseCompletion {
    pub phase: usize,
    pub terminal: usize,
}

/// Channels connecting a terminal to the dispatcher.
pub(crate) struct WorkerChannels {
    pub phase: watch::Receiver<PhaseSignal>,
    pub stop: watch::Receiver<bool>,
    pub completions: mpsc::UnboundedSender<PhaseCompletion>,
    pub faults: mpsc::UnboundedSender<DriverError>,
}

enum PhaseExit {
    /// A new phase signal has already been observed.
    Changed,
    /// Nothing more to do until the next signal.
    Wait,
    Stop,
}

pub(crate) struct Worker {
    terminal: usize,
    local: usize,
    config: Arc<WorkloadConfiguration>,
    executor: Box<dyn TransactionExecutor>,
    channels: WorkerChannels,
    progress: Arc<WorkerProgress>,
    clock: RunClock,
    arrival: ArrivalController,
    rng: StdRng,
    accumulator: OutcomeAccumulator,
}

impl Worker {
    /// `terminal` is the global index, `local` the index within its benchmark.
    pub fn new(
        terminal: usize,
        local: usize,
        config: Arc<WorkloadConfiguration>,
        executor: Box<dyn TransactionExecutor>,
        channels: WorkerChannels,
        clock: RunClock,
    ) -> Self {
        Self {
            terminal,
            local,
            arrival: ArrivalController::new(config.seed, terminal, config.queue_limit),
            rng: StdRng::seed_from_u64(terminal_seed(config.seed, terminal, SELECTION_STREAM)),
            accumulator: OutcomeAccumulator::new(terminal, config.record_abort_messages),
            progress: Arc::new(WorkerProgress::new(terminal)),
            config,
            executor,
            channels,
            clock,
        }
    }

    pub fn progress(&self) -> Arc<WorkerProgress> {
        Arc::clone(&self.progress)
    }

    /// Runs until the schedule finishes or stop is raised, then hands back
    /// everything the terminal recorded.
    pub async fn run(mut self) -> OutcomeAccumulator {
        debug!(terminal = self.terminal, benchmark = %self.config.benchmark, "Terminal started");
        loop {
            if *self.channels.stop.borrow() {
                break;
            }
            let signal = self.channels.phase.borrow_and_update().clone();
            let exit = match signal {
                PhaseSignal::Finished => break,
                PhaseSignal::Pending => PhaseExit::Wait,
                PhaseSignal::Active(active) => self.run_phase(&active).await,
            };
            match exit {
                PhaseExit::Stop => break,
                PhaseExit::Changed => continue,
                PhaseExit::Wait => {
                    if self.progress.state() != WorkerState::Initializing {
                        self.progress.set_state(WorkerState::Idle);
                    }
                    if !self.wait_for_signal().await {
                        break;
                    }
                }
            }
        }

        self.progress.set_state(WorkerState::Done);
        debug!(
            terminal = self.terminal,
            attempts = self.progress.attempts(),
            "Terminal finished"
        );
        let accumulator = self.accumulator;
        drop(self.executor);
        self.progress.set_state(WorkerState::Terminated);
        accumulator
    }

    /// Waits for a new phase signal; false when the run is stopping.
    async fn wait_for_signal(&mut self) -> bool {
        tokio::select! {
            changed = self.channels.phase.changed() => changed.is_ok(),
            _ = self.channels.stop.changed() => false,
        }
    }

    async fn run_phase(&mut self, active: &ActivePhase) -> PhaseExit {
        let phase = Arc::clone(&active.phase);
        if phase.is_disabled() || self.local >= phase.active_terminals() {
            return PhaseExit::Wait;
        }
        debug!(terminal = self.terminal, phase = %phase, "Entering phase");

        let mut selector = TransactionSelector::for_phase(
            &phase,
            Arc::clone(&self.config.transaction_types),
            self.config.trace.clone(),
        );
        if self.config.trace.is_some() {
            self.arrival.unpaced();
        } else if let Err(fault) = self.arrival.begin(&phase, self.local, active.started) {
            self.report(fault);
            return PhaseExit::Stop;
        }

        loop {
            if *self.channels.stop.borrow() {
                return PhaseExit::Stop;
            }
            if self.channels.phase.has_changed().unwrap_or(true) {
                return PhaseExit::Changed;
            }
            if active.is_over(Instant::now()) {
                return PhaseExit::Wait;
            }

            match self.arrival.next(Instant::now()) {
                Err(fault) => {
                    self.report(fault);
                    return PhaseExit::Stop;
                }
                Ok(NextArrival::Now) => {}
                Ok(NextArrival::At(due)) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(due) => {}
                        _ = self.channels.phase.changed() => return PhaseExit::Changed,
                        _ = self.channels.stop.changed() => return PhaseExit::Stop,
                    }
                    if active.is_over(Instant::now()) {
                        return PhaseExit::Wait;
                    }
                }
            }

            match selector.next(&mut self.rng) {
                Selection::Transaction(txn, params) => {
                    self.execute(&phase, active, &txn, params.as_deref()).await;
                }
                Selection::PassComplete | Selection::Exhausted => {
                    debug!(
                        terminal = self.terminal,
                        phase = phase.index() + 1,
                        "No more work in phase"
                    );
                    let _ = self.channels.completions.send(PhaseCompletion {
                        phase: phase.index(),
                        terminal: self.local,
                    });
                    return PhaseExit::Wait;
                }
            }
        }
    }

    async fn execute(
        &mut self,
        phase: &Phase,
        active: &ActivePhase,
        txn: &TransactionType,
        params: Option<&[String]>,
    ) {
        let started = Instant::now();
        let warmup = started < active.measure_from;
        self.progress.set_state(if warmup {
            WorkerState::Warmup
        } else {
            WorkerState::Measure
        });

        let request = TransactionRequest {
            transaction: txn,
            params,
            phase,
            warmup,
            terminal: self.local,
        };
        let status = match AssertUnwindSafe(self.executor.execute(&request))
            .catch_unwind()
            .await
        {
            Ok(Ok(status)) => status,
            Ok(Err(error)) => error.into_status(),
            Err(panic) => TransactionStatus::UnexpectedError(format!(
                "executor panicked: {}",
                panic_message(panic.as_ref())
            )),
        };
        let completed = Instant::now();

        if let TransactionStatus::UnexpectedError(message) = &status {
            trace!(terminal = self.terminal, transaction = %txn, %message, "Unexpected error");
        }
        self.progress.record(status.kind(), warmup);
        self.accumulator.record(
            txn,
            phase.index(),
            &status,
            self.clock.micros(started),
            self.clock.micros(completed),
            warmup,
        );
    }

    fn report(&self, fault: DriverError) {
        error!(terminal = self.terminal, %fault, "Terminal fault");
        let _ = self.channels.faults.send(fault);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
