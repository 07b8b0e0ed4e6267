use oltpbench_core::{OutcomeKind, TransactionType};

/// One completed transaction attempt.
///
/// Field order defines the sort order: completion time first, then the
/// remaining fields as tie-breakers so that merged record sequences are
/// identical no matter which accumulator was merged first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutcomeRecord {
    /// Wall-clock completion, microseconds since the Unix epoch.
    pub completed_micros: u64,
    /// Wall-clock start, microseconds since the Unix epoch.
    pub started_micros: u64,
    /// Global terminal index.
    pub worker: usize,
    pub transaction: TransactionType,
    /// Zero-based phase index.
    pub phase: usize,
    pub kind: OutcomeKind,
    /// Completed while the phase's warmup window was open.
    pub warmup: bool,
}

impl OutcomeRecord {
    /// Start-to-completion time in microseconds.
    #[must_use]
    pub fn latency_micros(&self) -> u64 {
        self.completed_micros.saturating_sub(self.started_micros)
    }
}
