//! Periodic progress snapshots, read from per-terminal atomics.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

use crate::worker::{WorkerProgress, WorkerState};

/// Progress observed at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Attempts since the run started, warmup included.
    pub total: u64,
    /// Attempts since the previous snapshot.
    pub interval: u64,
    /// `interval` divided by the time since the previous snapshot.
    pub throughput: f64,
    /// Number of terminals in each state.
    pub states: BTreeMap<WorkerState, usize>,
}

/// Samples terminal progress without pausing terminals.
pub struct ProgressMonitor {
    workers: Vec<Arc<WorkerProgress>>,
    last_total: u64,
    last_tick: Instant,
}

impl ProgressMonitor {
    #[must_use]
    pub fn new(workers: Vec<Arc<WorkerProgress>>) -> Self {
        Self {
            workers,
            last_total: 0,
            last_tick: Instant::now(),
        }
    }

    /// Reads every terminal's counters and advances the interval.
    pub fn snapshot(&mut self) -> ProgressSnapshot {
        let now = Instant::now();
        let total: u64 = self.workers.iter().map(|w| w.attempts()).sum();
        let mut states = BTreeMap::new();
        for worker in &self.workers {
            *states.entry(worker.state()).or_insert(0) += 1;
        }

        let elapsed = now.duration_since(self.last_tick).as_secs_f64();
        let interval = total.saturating_sub(self.last_total);
        let throughput = if elapsed > 0.0 {
            interval as f64 / elapsed
        } else {
            0.0
        };
        self.last_total = total;
        self.last_tick = now;

        ProgressSnapshot {
            total,
            interval,
            throughput,
            states,
        }
    }

    /// Logs a snapshot every `every` until the task is aborted.
    pub async fn run(mut self, every: Duration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = self.snapshot();
            let states: Vec<String> = snapshot
                .states
                .iter()
                .map(|(state, n)| format!("{state}={n}"))
                .collect();
            info!(
                completed = snapshot.interval,
                throughput = %format!("{:.2}", snapshot.throughput),
                terminals = %states.join(","),
                "Interval progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oltpbench_core::OutcomeKind;

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_counts_interval_and_states() {
        let workers: Vec<_> = (0..3).map(|t| Arc::new(WorkerProgress::new(t))).collect();
        let mut monitor = ProgressMonitor::new(workers.clone());

        workers[0].record(OutcomeKind::Success, false);
        workers[1].record(OutcomeKind::Retry, false);
        workers[1].record(OutcomeKind::Success, true);
        workers[2].set_state(WorkerState::Measure);
        tokio::time::advance(Duration::from_secs(2)).await;

        let first = monitor.snapshot();
        assert_eq!(first.total, 3);
        assert_eq!(first.interval, 3);
        assert!((first.throughput - 1.5).abs() < 1e-9);
        assert_eq!(first.states[&WorkerState::Initializing], 2);
        assert_eq!(first.states[&WorkerState::Measure], 1);

        workers[2].record(OutcomeKind::UnexpectedError, false);
        tokio::time::advance(Duration::from_secs(1)).await;
        let second = monitor.snapshot();
        assert_eq!(second.total, 4);
        assert_eq!(second.interval, 1);
    }
}
