//! CSV exports: raw per-transaction records and windowed series.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::ResultsResult;
use crate::results::Results;
use crate::window::ThroughputSeries;

/// Column headings of a windowed export.
pub const WINDOW_HEADERS: [&str; 12] = [
    "Time (seconds)",
    "Requests",
    "Throughput (requests/second)",
    "Average Latency (millisecond)",
    "Minimum Latency (millisecond)",
    "25th Percentile Latency (millisecond)",
    "Median Latency (millisecond)",
    "75th Percentile Latency (millisecond)",
    "90th Percentile Latency (millisecond)",
    "95th Percentile Latency (millisecond)",
    "99th Percentile Latency (millisecond)",
    "Maximum Latency (millisecond)",
];

/// One line of the raw export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Transaction Type Index")]
    pub transaction_id: u32,

    #[serde(rename = "Transaction Name")]
    pub transaction_name: String,

    /// Relative to the start of the measured window.
    #[serde(rename = "Completion Time (microseconds)")]
    pub completed_micros: u64,

    #[serde(rename = "Latency (microseconds)")]
    pub latency_micros: u64,

    #[serde(rename = "Worker Id")]
    pub worker: usize,

    /// One-based.
    #[serde(rename = "Phase Id")]
    pub phase: usize,
}

/// Measured, committed records as raw rows, in completion order.
#[must_use]
pub fn raw_rows(results: &Results) -> Vec<RawRow> {
    let origin = results.started_micros().unwrap_or(0);
    results
        .successes()
        .map(|record| RawRow {
            transaction_id: record.transaction.id(),
            transaction_name: record.transaction.name().to_string(),
            completed_micros: record.completed_micros.saturating_sub(origin),
            latency_micros: record.latency_micros(),
            worker: record.worker,
            phase: record.phase + 1,
        })
        .collect()
}

/// Writes the raw export.
pub fn write_raw<W: Write>(results: &Results, writer: W) -> ResultsResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let rows = raw_rows(results);
    if rows.is_empty() {
        // serde only emits the header with the first row.
        csv.write_record([
            "Transaction Type Index",
            "Transaction Name",
            "Completion Time (microseconds)",
            "Latency (microseconds)",
            "Worker Id",
            "Phase Id",
        ])?;
    }
    for row in &rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Reads a raw export back.
pub fn read_raw<R: Read>(reader: R) -> ResultsResult<Vec<RawRow>> {
    let mut csv = csv::Reader::from_reader(reader);
    let rows = csv.deserialize().collect::<Result<Vec<RawRow>, _>>()?;
    Ok(rows)
}

/// Re-aggregates raw rows into `window_secs` windows.
#[must_use]
pub fn series_from_raw(rows: &[RawRow], window_secs: u64) -> ThroughputSeries {
    ThroughputSeries::from_samples(
        rows.iter().map(|r| (r.completed_micros, r.latency_micros)),
        window_secs,
    )
}

fn millis(micros: u64) -> String {
    format!("{:.3}", micros as f64 / 1000.0)
}

/// Writes a windowed series.
pub fn write_series<W: Write>(series: &ThroughputSeries, writer: W) -> ResultsResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(WINDOW_HEADERS)?;
    for row in series.rows() {
        let l = &row.latency;
        csv.write_record([
            row.time_secs.to_string(),
            row.requests.to_string(),
            format!("{:.3}", row.throughput),
            format!("{:.3}", l.average / 1000.0),
            millis(l.min),
            millis(l.p25),
            millis(l.median),
            millis(l.p75),
            millis(l.p90),
            millis(l.p95),
            millis(l.p99),
            millis(l.max),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::OutcomeAccumulator;
    use oltpbench_core::{TransactionStatus, TransactionType};

    #[test]
    fn test_raw_export_keeps_measured_successes_only() {
        let get = TransactionType::new(4, "Get", "kv").unwrap();
        let mut acc = OutcomeAccumulator::new(2, false);
        acc.record(&get, 1, &TransactionStatus::Success, 5_000, 5_100, true);
        acc.record(&get, 1, &TransactionStatus::Success, 10_000, 10_250, false);
        acc.record(&get, 1, &TransactionStatus::Retry, 10_300, 10_400, false);
        acc.record(&get, 1, &TransactionStatus::Success, 10_500, 12_000, false);

        let mut out = Vec::new();
        write_raw(&acc.into_results(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Transaction Type Index,Transaction Name,Completion Time (microseconds),\
             Latency (microseconds),Worker Id,Phase Id"
        );
        assert_eq!(lines[1], "4,Get,250,250,2,2");
        assert_eq!(lines[2], "4,Get,2000,1500,2,2");
        assert_eq!(lines.len(), 3);

        let rows = read_raw(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].latency_micros, 1500);
    }

    #[test]
    fn test_empty_raw_export_has_header() {
        let mut out = Vec::new();
        write_raw(&Results::new(), &mut out).unwrap();
        assert!(read_raw(out.as_slice()).unwrap().is_empty());
    }

    #[test]
    fn test_series_csv() {
        let series = ThroughputSeries::from_samples(vec![(0, 2_000), (500_000, 4_000)], 1);
        let mut out = Vec::new();
        write_series(&series, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("Time (seconds),Requests,Throughput (requests/second)"));
        assert_eq!(
            lines[1],
            "0,2,2.000,3.000,2.000,2.000,4.000,4.000,4.000,4.000,4.000,4.000"
        );
    }
}
