use oltpbench_core::{OutcomeKind, TransactionStatus, TransactionType};

use crate::record::OutcomeRecord;
use crate::results::Results;

/// Outcomes collected by a single terminal.
///
/// Owned exclusively by its terminal until it is handed to the dispatcher at
/// join time and folded into [`Results`].
#[derive(Debug, Clone)]
pub struct OutcomeAccumulator {
    worker: usize,
    record_abort_messages: bool,
    results: Results,
}

impl OutcomeAccumulator {
    #[must_use]
    pub fn new(worker: usize, record_abort_messages: bool) -> Self {
        Self {
            worker,
            record_abort_messages,
            results: Results::default(),
        }
    }

    #[must_use]
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Records one attempt.
    ///
    /// Warmup attempts only bump the warmup counter; they never reach the
    /// reported histograms or the raw records.
    pub fn record(
        &mut self,
        transaction: &TransactionType,
        phase: usize,
        status: &TransactionStatus,
        started_micros: u64,
        completed_micros: u64,
        warmup: bool,
    ) {
        if warmup {
            self.results.warmup.put(transaction.clone());
            return;
        }

        let kind = status.kind();
        self.results.outcomes[kind.index()].put(transaction.clone());
        if self.record_abort_messages {
            if let TransactionStatus::UserAbort(Some(message)) = status {
                self.results
                    .abort_messages
                    .put(format!("{}/{message}", transaction.name()));
            }
        }
        self.results.push_record(OutcomeRecord {
            completed_micros,
            started_micros,
            worker: self.worker,
            transaction: transaction.clone(),
            phase,
            kind,
            warmup,
        });
    }

    /// Measured attempts recorded so far with `kind`.
    #[must_use]
    pub fn count(&self, kind: OutcomeKind) -> u64 {
        self.results.count(kind)
    }

    /// Read-only view of what has been collected.
    #[must_use]
    pub fn results(&self) -> &Results {
        &self.results
    }

    #[must_use]
    pub fn into_results(self) -> Results {
        self.results
    }
}

impl From<OutcomeAccumulator> for Results {
    fn from(accumulator: OutcomeAccumulator) -> Self {
        accumulator.into_results()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn() -> TransactionType {
        TransactionType::new(1, "Get", "kv").unwrap()
    }

    #[test]
    fn test_warmup_is_counted_but_not_reported() {
        let mut acc = OutcomeAccumulator::new(3, false);
        acc.record(&txn(), 0, &TransactionStatus::Success, 10, 20, true);
        acc.record(&txn(), 0, &TransactionStatus::Success, 30, 45, false);

        let results = acc.into_results();
        assert_eq!(results.warmup().total(), 1);
        assert_eq!(results.count(OutcomeKind::Success), 1);
        assert_eq!(results.records().len(), 1);
        assert_eq!(results.records()[0].worker, 3);
        assert_eq!(results.records()[0].latency_micros(), 15);
    }

    #[test]
    fn test_abort_messages_only_when_enabled() {
        let abort = TransactionStatus::UserAbort(Some("no stock".into()));

        let mut quiet = OutcomeAccumulator::new(0, false);
        quiet.record(&txn(), 0, &abort, 0, 1, false);
        assert!(quiet.results().abort_messages().is_empty());

        let mut verbose = OutcomeAccumulator::new(0, true);
        verbose.record(&txn(), 0, &abort, 0, 1, false);
        verbose.record(&txn(), 0, &TransactionStatus::UserAbort(None), 0, 1, false);
        assert_eq!(verbose.results().abort_messages().get(&"Get/no stock".to_string()), 1);
        assert_eq!(verbose.count(OutcomeKind::UserAbort), 2);
    }
}
