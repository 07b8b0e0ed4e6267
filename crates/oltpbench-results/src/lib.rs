//! Outcome aggregation and reporting: histograms, merged results, CSV exports
//! and summaries.

pub mod accumulator;
pub mod error;
pub mod export;
pub mod histogram;
pub mod output;
pub mod record;
pub mod results;
pub mod summary;
pub mod window;

pub use accumulator::OutcomeAccumulator;
pub use error::{ResultsError, ResultsResult};
pub use export::{
    raw_rows, read_raw, series_from_raw, write_raw, write_series, RawRow, WINDOW_HEADERS,
};
pub use histogram::Histogram;
pub use output::{next_filename, Output, OutputTarget};
pub use record::OutcomeRecord;
pub use results::Results;
pub use summary::{render_histograms, RunSummary, SEPARATOR};
pub use window::{LatencyStats, ThroughputSeries, WindowRow};
