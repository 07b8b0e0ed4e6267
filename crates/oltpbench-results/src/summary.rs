//! Human-readable and JSON run summaries.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use chrono::{DateTime, Utc};
use oltpbench_core::{OutcomeKind, TransactionTypes, WorkloadConfiguration};
use serde::Serialize;

use crate::results::Results;
use crate::window::LatencyStats;

/// Separator framing banners and histogram blocks.
pub const SEPARATOR: &str =
    "======================================================================";

/// Renders the histogram block: one section per outcome kind, plus the
/// user-abort messages when any were recorded.
#[must_use]
pub fn render_histograms(results: &Results) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SEPARATOR}");
    for kind in OutcomeKind::ALL {
        let _ = writeln!(out, "{}:\n{}", kind.heading(), results.histogram(kind));
    }
    if !results.abort_messages().is_empty() {
        let _ = writeln!(out, "User Aborts:\n{}", results.abort_messages());
    }
    let _ = write!(out, "{SEPARATOR}");
    out
}

/// Totals of one run, serialized next to the CSV exports.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub benchmarks: Vec<String>,
    pub database: Option<String>,
    pub isolation: Option<String>,
    pub scale_factor: Option<f64>,
    pub terminals: usize,
    pub start_time: Option<String>,
    pub measured_requests: u64,
    pub duration_secs: f64,
    pub throughput: f64,
    pub latency_micros: LatencyStats,
    pub outcomes: BTreeMap<String, u64>,
    pub warmup_requests: u64,
    pub groupings: BTreeMap<String, u64>,
}

impl RunSummary {
    #[must_use]
    pub fn new(results: &Results, configs: &[&WorkloadConfiguration]) -> Self {
        let first = configs.first();
        let outcomes = OutcomeKind::ALL
            .iter()
            .map(|kind| (kind.to_string(), results.count(*kind)))
            .collect();

        let mut groupings = BTreeMap::new();
        for config in configs {
            let types: &TransactionTypes = &config.transaction_types;
            for grouping in &config.groupings {
                *groupings.entry(grouping.name().to_string()).or_insert(0) +=
                    results.grouping_count(grouping, types);
            }
        }

        Self {
            benchmarks: configs.iter().map(|c| c.benchmark.clone()).collect(),
            database: first.map(|c| c.database.db_type.to_string()),
            isolation: first.map(|c| c.isolation.to_string()),
            scale_factor: first.map(|c| c.scale_factor),
            terminals: configs.iter().map(|c| c.terminals).sum(),
            start_time: results.started_micros().and_then(format_timestamp),
            measured_requests: results.measured_requests(),
            duration_secs: results.duration().as_secs_f64(),
            throughput: results.throughput(),
            latency_micros: results.latency(),
            outcomes,
            warmup_requests: results.warmup().total(),
            groupings,
        }
    }

    /// Pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn format_timestamp(micros: u64) -> Option<String> {
    let secs = i64::try_from(micros / 1_000_000).ok()?;
    let nanos = ((micros % 1_000_000) * 1_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos).map(|t| t.to_rfc3339())
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Results(measured_requests={}, duration={:.3}s) = {:.2} requests/sec",
            self.measured_requests, self.duration_secs, self.throughput
        )?;
        for (name, count) in &self.groupings {
            write!(f, "\n  grouping {name}: {count}")?;
        }
        Ok(())
    }
}
