//! Time-windowed throughput and latency series.

use serde::Serialize;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Latency distribution of a set of samples, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub average: f64,
    pub min: u64,
    pub p25: u64,
    pub median: u64,
    pub p75: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub max: u64,
}

impl LatencyStats {
    /// Computes the distribution; all fields are 0 for an empty input.
    #[must_use]
    pub fn from_latencies(mut latencies: Vec<u64>) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }
        latencies.sort_unstable();

        let sum: u128 = latencies.iter().map(|&l| u128::from(l)).sum();
        let count = latencies.len();
        Self {
            count: count as u64,
            average: sum as f64 / count as f64,
            min: latencies[0],
            p25: percentile(&latencies, 0.25),
            median: percentile(&latencies, 0.50),
            p75: percentile(&latencies, 0.75),
            p90: percentile(&latencies, 0.90),
            p95: percentile(&latencies, 0.95),
            p99: percentile(&latencies, 0.99),
            max: latencies[count - 1],
        }
    }
}

/// Nearest-rank percentile of a sorted, non-empty slice.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    let index = ((sorted.len() as f64) * p) as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// One window of the series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowRow {
    /// Window start, seconds from the origin.
    pub time_secs: u64,
    pub requests: u64,
    /// Requests divided by the window length.
    pub throughput: f64,
    pub latency: LatencyStats,
}

/// Completed requests bucketed into fixed windows.
///
/// Bucket `i` covers `[i * W, (i + 1) * W)` seconds from the origin. Rows run
/// from bucket 0 to the last populated bucket; empty buckets in between are
/// emitted with zero requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSeries {
    window_secs: u64,
    rows: Vec<WindowRow>,
}

impl ThroughputSeries {
    /// Builds the series from `(completed, latency)` pairs, both in
    /// microseconds, with completion times relative to the origin.
    pub fn from_samples<I>(samples: I, window_secs: u64) -> Self
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        let window_secs = window_secs.max(1);
        let window_micros = window_secs * MICROS_PER_SEC;

        let mut buckets: Vec<Vec<u64>> = Vec::new();
        for (completed, latency) in samples {
            let index = (completed / window_micros) as usize;
            if index >= buckets.len() {
                buckets.resize_with(index + 1, Vec::new);
            }
            buckets[index].push(latency);
        }

        let rows = buckets
            .into_iter()
            .enumerate()
            .map(|(index, latencies)| {
                let requests = latencies.len() as u64;
                WindowRow {
                    time_secs: index as u64 * window_secs,
                    requests,
                    throughput: requests as f64 / window_secs as f64,
                    latency: LatencyStats::from_latencies(latencies),
                }
            })
            .collect();

        Self { window_secs, rows }
    }

    #[must_use]
    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    #[must_use]
    pub fn rows(&self) -> &[WindowRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Requests across every window.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.rows.iter().map(|r| r.requests).sum()
    }
}
