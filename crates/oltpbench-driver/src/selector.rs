//! Transaction selection for one terminal within one phase.

use std::sync::Arc;

use oltpbench_core::{Phase, TracePlayback, TransactionType, TransactionTypes};
use rand::Rng;

/// What a terminal should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Execute this transaction, with recorded parameters when replaying a trace.
    Transaction(TransactionType, Option<Arc<[String]>>),
    /// An untimed serial phase finished its single pass.
    PassComplete,
    /// Nothing left to issue (trace consumed, or no selectable type).
    Exhausted,
}

#[derive(Debug)]
enum Mode {
    Serial { cursor: usize, looping: bool },
    Weighted { cumulative: Vec<f64>, total: f64 },
    Trace(Arc<TracePlayback>),
}

/// Picks transaction types according to the phase's mode.
#[derive(Debug)]
pub struct TransactionSelector {
    types: Arc<TransactionTypes>,
    mode: Mode,
}

impl TransactionSelector {
    /// Builds the selector for `phase`. A trace, when present, replaces both
    /// serial and weighted selection.
    #[must_use]
    pub fn for_phase(
        phase: &Phase,
        types: Arc<TransactionTypes>,
        trace: Option<Arc<TracePlayback>>,
    ) -> Self {
        let mode = if let Some(trace) = trace {
            Mode::Trace(trace)
        } else if phase.is_serial() {
            Mode::Serial {
                cursor: 0,
                looping: phase.is_timed(),
            }
        } else {
            let mut running = 0.0;
            let cumulative: Vec<f64> = phase
                .weights()
                .iter()
                .map(|w| {
                    running += w;
                    running
                })
                .collect();
            Mode::Weighted {
                cumulative,
                total: running,
            }
        };
        Self { types, mode }
    }

    /// Next transaction for this terminal.
    pub fn next<R: Rng>(&mut self, rng: &mut R) -> Selection {
        match &mut self.mode {
            Mode::Serial { cursor, looping } => {
                if *cursor >= self.types.len() {
                    if !*looping || self.types.is_empty() {
                        return Selection::PassComplete;
                    }
                    *cursor = 0;
                }
                let txn = self.types.get(*cursor).cloned();
                *cursor += 1;
                txn.map_or(Selection::PassComplete, |t| Selection::Transaction(t, None))
            }
            Mode::Weighted { cumulative, total } => {
                if *total <= 0.0 {
                    return Selection::Exhausted;
                }
                let draw = rng.gen::<f64>() * *total;
                let position = cumulative
                    .partition_point(|c| *c <= draw)
                    .min(cumulative.len() - 1);
                self.types
                    .get(position)
                    .cloned()
                    .map_or(Selection::Exhausted, |t| Selection::Transaction(t, None))
            }
            Mode::Trace(trace) => trace.next_entry().map_or(Selection::Exhausted, |entry| {
                Selection::Transaction(entry.transaction.clone(), Some(Arc::clone(&entry.params)))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oltpbench_core::{PhaseSchedule, PhaseSpec, TraceEntry, TransactionTypeDecl};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn types() -> Arc<TransactionTypes> {
        Arc::new(
            TransactionTypes::from_declarations(
                "tpcc",
                &[
                    TransactionTypeDecl::named("NewOrder"),
                    TransactionTypeDecl::named("Payment"),
                    TransactionTypeDecl::named("Delivery"),
                ],
                0,
            )
            .unwrap(),
        )
    }

    fn phase(spec: PhaseSpec) -> Arc<Phase> {
        let mut schedule = PhaseSchedule::new(1, 3);
        schedule.add_phase(spec).unwrap();
        Arc::clone(&schedule.phases()[0])
    }

    fn name(selection: Selection) -> String {
        match selection {
            Selection::Transaction(txn, _) => txn.name().to_string(),
            other => format!("{other:?}"),
        }
    }

    #[test]
    fn test_untimed_serial_is_one_pass() {
        let p = phase(PhaseSpec {
            serial: true,
            weights: vec![1.0, 1.0, 1.0],
            ..Default::default()
        });
        let mut selector = TransactionSelector::for_phase(&p, types(), None);
        let mut rng = StdRng::seed_from_u64(0);

        let picked: Vec<String> = (0..4).map(|_| name(selector.next(&mut rng))).collect();
        assert_eq!(picked, vec!["NewOrder", "Payment", "Delivery", "PassComplete"]);
    }

    #[test]
    fn test_timed_serial_loops() {
        let p = phase(PhaseSpec {
            duration_secs: 10,
            serial: true,
            weights: vec![0.0, 0.0, 0.0],
            ..Default::default()
        });
        let mut selector = TransactionSelector::for_phase(&p, types(), None);
        let mut rng = StdRng::seed_from_u64(0);

        let picked: Vec<String> = (0..5).map(|_| name(selector.next(&mut rng))).collect();
        assert_eq!(picked, vec!["NewOrder", "Payment", "Delivery", "NewOrder", "Payment"]);
    }

    #[test]
    fn test_weighted_split() {
        let p = phase(PhaseSpec {
            duration_secs: 10,
            weights: vec![50.0, 30.0, 20.0],
            ..Default::default()
        });
        let mut selector = TransactionSelector::for_phase(&p, types(), None);
        let mut rng = StdRng::seed_from_u64(7);

        let draws = 100_000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..draws {
            *counts.entry(name(selector.next(&mut rng))).or_default() += 1;
        }
        let share = |n: &str| counts[n] as f64 / draws as f64;
        assert!((share("NewOrder") - 0.5).abs() < 0.01);
        assert!((share("Payment") - 0.3).abs() < 0.01);
        assert!((share("Delivery") - 0.2).abs() < 0.01);
    }

    #[test]
    fn test_zero_weight_is_never_picked() {
        let p = phase(PhaseSpec {
            duration_secs: 10,
            weights: vec![0.0, 1.0, 0.0],
            ..Default::default()
        });
        let mut selector = TransactionSelector::for_phase(&p, types(), None);
        let mut rng = StdRng::seed_from_u64(1);
        assert!((0..1000).all(|_| name(selector.next(&mut rng)) == "Payment"));
    }

    #[test]
    fn test_trace_replaces_selection() {
        let types = types();
        let entry = |position: usize, param: &str| TraceEntry {
            transaction: types.get(position).unwrap().clone(),
            params: vec![param.to_string()].into(),
        };
        let trace = Arc::new(TracePlayback::new(vec![entry(2, "a"), entry(0, "b")]));
        let p = phase(PhaseSpec {
            duration_secs: 10,
            weights: vec![1.0, 0.0, 0.0],
            ..Default::default()
        });
        let mut selector = TransactionSelector::for_phase(&p, Arc::clone(&types), Some(trace));
        let mut rng = StdRng::seed_from_u64(0);

        match selector.next(&mut rng) {
            Selection::Transaction(txn, Some(params)) => {
                assert_eq!(txn.name(), "Delivery");
                assert_eq!(&*params, &["a".to_string()]);
            }
            other => panic!("unexpected selection: {other:?}"),
        }
        assert_eq!(name(selector.next(&mut rng)), "NewOrder");
        assert_eq!(selector.next(&mut rng), Selection::Exhausted);
    }
}
