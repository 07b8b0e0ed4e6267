use std::time::Duration;

use oltpbench_core::CoreError;
use thiserror::Error;

/// Faults that halt a run.
///
/// Per-transaction failures never show up here; they are outcomes.
#[derive(Debug, Error)]
pub enum DriverError {
    /// A terminal fell further behind its arrival schedule than allowed.
    #[error(
        "queue overload on terminal {terminal}: {backlog} overdue requests \
         exceed the limit of {limit}"
    )]
    QueueOverload {
        /// Global terminal index.
        terminal: usize,
        /// Overdue arrivals at the time of the check.
        backlog: usize,
        /// Configured bound.
        limit: usize,
    },

    /// Terminals did not stop within the grace period.
    #[error("orchestration fault: terminals {terminals:?} did not stop within {grace:?}")]
    WorkerStuck {
        /// Global indices of the terminals still running.
        terminals: Vec<usize>,
        /// Grace period that elapsed.
        grace: Duration,
    },

    /// A terminal task ended abnormally.
    #[error("terminal task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Setup or collaborator failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DriverError {
    /// Returns true for faults raised after terminals started.
    #[must_use]
    pub fn is_in_run(&self) -> bool {
        !matches!(self, Self::Core(_))
    }
}

/// Result alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
