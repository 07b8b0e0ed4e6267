//! Merged outcome aggregate.

use std::time::Duration;

use oltpbench_core::{Grouping, OutcomeKind, TransactionType, TransactionTypes};

use crate::histogram::Histogram;
use crate::record::OutcomeRecord;
use crate::window::{LatencyStats, ThroughputSeries};

/// Aggregate of every terminal's outcomes.
///
/// Created empty, populated only through [`Results::merge`], and read once
/// the run is over. Merging is associative and commutative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Results {
    pub(crate) outcomes: [Histogram<TransactionType>; 4],
    pub(crate) abort_messages: Histogram<String>,
    pub(crate) warmup: Histogram<TransactionType>,
    records: Vec<OutcomeRecord>,
    started_micros: Option<u64>,
    ended_micros: Option<u64>,
}

fn merge_bound(a: Option<u64>, b: Option<u64>, pick: fn(u64, u64) -> u64) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(pick(x, y)),
        (x, y) => x.or(y),
    }
}

impl Results {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_record(&mut self, record: OutcomeRecord) {
        self.observe_window(record.started_micros, record.completed_micros);
        self.records.push(record);
    }

    /// Widens the measured window to include `[started, ended]` (epoch micros).
    pub fn observe_window(&mut self, started_micros: u64, ended_micros: u64) {
        self.started_micros = merge_bound(self.started_micros, Some(started_micros), u64::min);
        self.ended_micros = merge_bound(self.ended_micros, Some(ended_micros), u64::max);
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: Results) {
        for (mine, theirs) in self.outcomes.iter_mut().zip(other.outcomes.iter()) {
            mine.merge(theirs);
        }
        self.abort_messages.merge(&other.abort_messages);
        self.warmup.merge(&other.warmup);
        self.started_micros = merge_bound(self.started_micros, other.started_micros, u64::min);
        self.ended_micros = merge_bound(self.ended_micros, other.ended_micros, u64::max);

        self.records.extend(other.records);
        self.records.sort();
    }

    /// Merges any number of partial results.
    pub fn merge_all<I>(parts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Results>,
    {
        parts.into_iter().fold(Self::new(), |mut acc, part| {
            acc.merge(part.into());
            acc
        })
    }

    /// Per-type histogram of one outcome kind.
    #[must_use]
    pub fn histogram(&self, kind: OutcomeKind) -> &Histogram<TransactionType> {
        &self.outcomes[kind.index()]
    }

    /// Measured attempts with `kind`.
    #[must_use]
    pub fn count(&self, kind: OutcomeKind) -> u64 {
        self.outcomes[kind.index()].total()
    }

    /// User-abort reasons, when they were recorded.
    #[must_use]
    pub fn abort_messages(&self) -> &Histogram<String> {
        &self.abort_messages
    }

    /// Attempts completed inside warmup windows.
    #[must_use]
    pub fn warmup(&self) -> &Histogram<TransactionType> {
        &self.warmup
    }

    /// Measured records sorted by completion time.
    #[must_use]
    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    /// Measured, committed records.
    pub fn successes(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.records
            .iter()
            .filter(|r| r.kind == OutcomeKind::Success)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.warmup.is_empty()
    }

    /// Start of the measured window, epoch micros.
    #[must_use]
    pub fn started_micros(&self) -> Option<u64> {
        self.started_micros
    }

    /// End of the measured window, epoch micros.
    #[must_use]
    pub fn ended_micros(&self) -> Option<u64> {
        self.ended_micros
    }

    /// Committed transactions in the measured window.
    #[must_use]
    pub fn measured_requests(&self) -> u64 {
        self.count(OutcomeKind::Success)
    }

    /// Length of the measured window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        match (self.started_micros, self.ended_micros) {
            (Some(start), Some(end)) => Duration::from_micros(end.saturating_sub(start)),
            _ => Duration::ZERO,
        }
    }

    /// Committed transactions per second over the measured window.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.measured_requests() as f64 / secs
    }

    /// Latency distribution of committed transactions.
    #[must_use]
    pub fn latency(&self) -> LatencyStats {
        LatencyStats::from_latencies(self.successes().map(OutcomeRecord::latency_micros).collect())
    }

    /// Committed transactions bucketed into `window_secs` windows, optionally
    /// restricted to one transaction type.
    #[must_use]
    pub fn series(
        &self,
        window_secs: u64,
        transaction: Option<&TransactionType>,
    ) -> ThroughputSeries {
        let origin = self.started_micros.unwrap_or(0);
        let samples = self
            .successes()
            .filter(|r| transaction.map_or(true, |t| &r.transaction == t))
            .map(|r| (r.completed_micros.saturating_sub(origin), r.latency_micros()));
        ThroughputSeries::from_samples(samples, window_secs)
    }

    /// Committed transactions whose type belongs to `grouping`.
    #[must_use]
    pub fn grouping_count(&self, grouping: &Grouping, types: &TransactionTypes) -> u64 {
        let committed = self.histogram(OutcomeKind::Success);
        grouping.members(types).map(|txn| committed.get(txn)).sum()
    }
}
