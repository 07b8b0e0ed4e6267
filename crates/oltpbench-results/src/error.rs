use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while exporting or re-reading results.
#[derive(Debug, Error)]
pub enum ResultsError {
    /// Output file or stream could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Summary serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Output directory exists but is not a directory.
    #[error("output directory {0} is not a directory")]
    NotADirectory(PathBuf),
}

/// Result alias for results operations.
pub type ResultsResult<T> = Result<T, ResultsError>;
