// Property-based tests for windowed exports
//
// Properties tested:
// 1. Re-aggregating the raw CSV export reproduces the directly computed series
// 2. Rows run from window 0 to the last populated window, gaps included
// 3. Per-type window counts sum to the type's committed count

use oltpbench_core::{OutcomeKind, TransactionStatus, TransactionType};
use oltpbench_results::{read_raw, series_from_raw, write_raw, OutcomeAccumulator, Results};
use proptest::prelude::*;

fn build(samples: &[(u64, u64, bool, bool)]) -> (Results, Vec<TransactionType>) {
    let types = vec![
        TransactionType::new(1, "Read", "ycsb").unwrap(),
        TransactionType::new(2, "Update", "ycsb").unwrap(),
    ];
    let mut acc = OutcomeAccumulator::new(0, false);
    for &(start, latency, update, committed) in samples {
        let status = if committed {
            TransactionStatus::Success
        } else {
            TransactionStatus::Retry
        };
        acc.record(&types[usize::from(update)], 0, &status, start, start + latency, false);
    }
    (acc.into_results(), types)
}

fn samples() -> impl Strategy<Value = Vec<(u64, u64, bool, bool)>> {
    prop::collection::vec(
        (1_000_000u64..120_000_000, 1u64..2_000_000, any::<bool>(), prop::bool::weighted(0.8)),
        1..300,
    )
}

proptest! {
    #[test]
    fn prop_raw_export_round_trips(samples in samples(), window in 1u64..15) {
        let (results, _) = build(&samples);

        let mut csv = Vec::new();
        write_raw(&results, &mut csv).unwrap();
        let rows = read_raw(csv.as_slice()).unwrap();

        prop_assert_eq!(series_from_raw(&rows, window), results.series(window, None));
    }

    #[test]
    fn prop_rows_cover_last_populated_window(samples in samples(), window in 1u64..15) {
        let (results, _) = build(&samples);
        let series = results.series(window, None);
        let origin = results.started_micros().unwrap();

        let last = results
            .successes()
            .map(|r| (r.completed_micros - origin) / (window * 1_000_000))
            .max();
        prop_assert_eq!(series.len() as u64, last.map_or(0, |l| l + 1));
        prop_assert_eq!(series.total_requests(), results.measured_requests());
    }

    #[test]
    fn prop_per_type_windows_sum_to_committed(samples in samples(), window in 1u64..15) {
        let (results, types) = build(&samples);
        for txn in &types {
            let series = results.series(window, Some(txn));
            prop_assert_eq!(
                series.total_requests(),
                results.histogram(OutcomeKind::Success).get(txn)
            );
        }
    }
}
