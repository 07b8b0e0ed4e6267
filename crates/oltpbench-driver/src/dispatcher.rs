//! Run orchestration.
//!
//! The dispatcher creates every terminal before the first phase starts and
//! keeps them for the whole run. Each benchmark has its own phase timeline,
//! published through a watch channel; terminals time themselves against the
//! published phase. When every timeline has finished (or a fatal fault
//! arrives) stop is raised, terminals are joined within the grace period and
//! their accumulators are merged.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use oltpbench_core::{BenchmarkModule, CoreError, Phase, WorkloadConfiguration};
use oltpbench_results::Results;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{error, info, warn};

use crate::clock::RunClock;
use crate::error::{DriverError, DriverResult};
use crate::monitor::ProgressMonitor;
use crate::worker::{PhaseCompletion, Worker, WorkerChannels, WorkerProgress};

/// Timing of the phase currently published to a benchmark's terminals.
#[derive(Debug)]
pub struct ActivePhase {
    pub phase: Arc<Phase>,
    /// When the phase (and its warmup) began.
    pub started: Instant,
    /// End of warmup; attempts starting earlier are not reported.
    pub measure_from: Instant,
    /// End of the measured window; `None` for untimed phases.
    pub deadline: Option<Instant>,
}

impl ActivePhase {
    #[must_use]
    pub fn new(phase: Arc<Phase>, started: Instant) -> Self {
        let measure_from = started + phase.warmup();
        let deadline = phase.is_timed().then(|| measure_from + phase.duration());
        Self {
            phase,
            started,
            measure_from,
            deadline,
        }
    }

    /// True once the measured window has elapsed.
    #[must_use]
    pub fn is_over(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// Phase state published to a benchmark's terminals.
#[derive(Debug, Clone)]
pub enum PhaseSignal {
    /// Before the first phase.
    Pending,
    Active(Arc<ActivePhase>),
    /// No phases remain.
    Finished,
}

/// One benchmark of a run.
#[derive(Clone)]
pub struct BenchmarkRun {
    pub config: Arc<WorkloadConfiguration>,
    pub module: Arc<dyn BenchmarkModule>,
}

impl BenchmarkRun {
    pub fn new(config: Arc<WorkloadConfiguration>, module: Arc<dyn BenchmarkModule>) -> Self {
        Self { config, module }
    }
}

/// Outcome of a run.
#[derive(Debug)]
pub struct RunReport {
    /// Everything collected, including after a fault.
    pub results: Results,
    /// First fatal fault, if any.
    pub fault: Option<DriverError>,
    /// Terminals started.
    pub terminals: usize,
}

impl RunReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.fault.is_none()
    }
}

/// Starts, schedules and stops every terminal of a run.
pub struct Dispatcher {
    runs: Vec<BenchmarkRun>,
    interval_monitor: Option<Duration>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(runs: Vec<BenchmarkRun>) -> Self {
        Self {
            runs,
            interval_monitor: None,
        }
    }

    /// Logs progress every `every` while the run is in progress.
    #[must_use]
    pub fn with_interval_monitor(mut self, every: Duration) -> Self {
        self.interval_monitor = (!every.is_zero()).then_some(every);
        self
    }

    /// Executes every benchmark's schedule to completion.
    ///
    /// Setup failures are returned as errors before any terminal starts.
    /// Faults raised during the run end it early and are reported in the
    /// [`RunReport`] together with the results gathered so far.
    pub async fn run(self) -> DriverResult<RunReport> {
        if self.runs.is_empty() {
            return Err(CoreError::config("no benchmark to execute").into());
        }
        for run in &self.runs {
            run.config.phases.validate_all()?;
        }

        let clock = RunClock::start();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (fault_tx, mut fault_rx) = mpsc::unbounded_channel();
        let grace = self
            .runs
            .iter()
            .map(|r| r.config.grace_period)
            .max()
            .unwrap_or_default();

        // Every executor is created before any terminal starts.
        let mut workers = Vec::new();
        let mut timelines = Vec::new();
        let mut terminal = 0;
        for run in &self.runs {
            let config = &run.config;
            let (phase_tx, phase_rx) = watch::channel(PhaseSignal::Pending);
            let (completion_tx, completion_rx) = mpsc::unbounded_channel();

            for local in 0..config.terminals {
                let executor = run.module.make_executor(local)?;
                let channels = WorkerChannels {
                    phase: phase_rx.clone(),
                    stop: stop_rx.clone(),
                    completions: completion_tx.clone(),
                    faults: fault_tx.clone(),
                };
                workers.push(Worker::new(
                    terminal,
                    local,
                    Arc::clone(config),
                    executor,
                    channels,
                    clock,
                ));
                terminal += 1;
            }

            timelines.push(drive_timeline(
                config.benchmark.clone(),
                config.phases.phases().to_vec(),
                config.phases.is_trace_driven() || config.trace.is_some(),
                phase_tx,
                completion_rx,
            ));
        }

        let terminals = workers.len();
        let progress: Vec<Arc<WorkerProgress>> = workers.iter().map(Worker::progress).collect();
        info!(terminals, benchmarks = self.runs.len(), "Starting terminals");
        let handles: Vec<(usize, JoinHandle<_>)> = workers
            .into_iter()
            .enumerate()
            .map(|(index, worker)| (index, tokio::spawn(worker.run())))
            .collect();

        let monitor = self
            .interval_monitor
            .map(|every| tokio::spawn(ProgressMonitor::new(progress).run(every)));

        let schedule = join_all(timelines);
        tokio::pin!(schedule);
        let mut fault = tokio::select! {
            _ = &mut schedule => None,
            Some(fault) = fault_rx.recv() => {
                error!(%fault, "Aborting run");
                Some(fault)
            }
        };

        info!("Stopping terminals");
        stop_tx.send_replace(true);
        if let Some(monitor) = monitor {
            monitor.abort();
        }

        let deadline = Instant::now() + grace;
        let mut parts = Vec::with_capacity(handles.len());
        let mut stuck = Vec::new();
        for (terminal, mut handle) in handles {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(accumulator)) => parts.push(accumulator),
                Ok(Err(join)) => {
                    error!(terminal, %join, "Terminal task failed");
                    if fault.is_none() {
                        fault = Some(DriverError::Join(join));
                    }
                }
                Err(_) => {
                    handle.abort();
                    stuck.push(terminal);
                }
            }
        }
        if !stuck.is_empty() {
            error!(terminals = ?stuck, ?grace, "Terminals did not stop within the grace period");
            if fault.is_none() {
                fault = Some(DriverError::WorkerStuck {
                    terminals: stuck,
                    grace,
                });
            }
        }
        if fault.is_none() {
            fault = fault_rx.try_recv().ok();
        }

        let results = Results::merge_all(parts);
        info!(
            measured = results.measured_requests(),
            failed = fault.is_some(),
            "Run complete"
        );
        Ok(RunReport {
            results,
            fault,
            terminals,
        })
    }
}

/// Publishes each phase of one benchmark in turn and waits for it to end.
async fn drive_timeline(
    benchmark: String,
    phases: Vec<Arc<Phase>>,
    trace_driven: bool,
    phase_tx: watch::Sender<PhaseSignal>,
    mut completions: mpsc::UnboundedReceiver<PhaseCompletion>,
) {
    for phase in phases {
        let active = Arc::new(ActivePhase::new(Arc::clone(&phase), Instant::now()));
        info!(benchmark = %benchmark, phase = %phase, "Phase started");
        phase_tx.send_replace(PhaseSignal::Active(Arc::clone(&active)));

        if phase.is_disabled() {
            sleep_until(active.started + phase.schedule_length()).await;
        } else if phase.is_timed() && !trace_driven {
            if let Some(deadline) = active.deadline {
                sleep_until(deadline).await;
            }
        } else {
            wait_for_completions(&active, &mut completions).await;
        }
        info!(benchmark = %benchmark, phase = phase.index() + 1, "Phase finished");
    }
    phase_tx.send_replace(PhaseSignal::Finished);
}

/// Waits until every active terminal reports it has nothing left to do in the
/// phase, or until the deadline for timed phases.
async fn wait_for_completions(
    active: &ActivePhase,
    completions: &mut mpsc::UnboundedReceiver<PhaseCompletion>,
) {
    let expected = active.phase.active_terminals();
    let index = active.phase.index();
    let deadline = async {
        match active.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut done = HashSet::new();
    while done.len() < expected {
        tokio::select! {
            _ = &mut deadline => return,
            message = completions.recv() => match message {
                Some(completion) if completion.phase == index => {
                    done.insert(completion.terminal);
                }
                Some(_) => {}
                None => {
                    warn!(phase = index + 1, "All terminals exited before the phase ended");
                    return;
                }
            },
        }
    }
}
