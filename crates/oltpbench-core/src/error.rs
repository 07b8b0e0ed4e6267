use thiserror::Error;

/// Canonical error type for workload definition and collaborator operations.
///
/// Every variant except `Collaborator` and `IoError` is a configuration
/// error: it is raised before any terminal is started and aborts the run.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Generic configuration problem.
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable explanation.
        message: String,
    },

    /// A phase declaration is invalid.
    #[error("configuration error in phase {phase}: {message}")]
    InvalidPhase {
        /// One-based phase position in declaration order.
        phase: usize,
        /// Human-readable explanation.
        message: String,
    },

    /// A phase carries a different number of weights than declared transaction types.
    #[error(
        "configuration is inconsistent: phase {phase} contains {weights} weights \
         but {expected} transaction types are defined"
    )]
    WeightCountMismatch {
        /// One-based phase position.
        phase: usize,
        /// Number of weights found.
        weights: usize,
        /// Number of declared transaction types.
        expected: usize,
        /// Whether the offending phase is serial.
        serial: bool,
    },

    /// A reporting grouping is invalid.
    #[error("grouping `{name}` is invalid: {message}")]
    InvalidGrouping {
        /// Grouping label as configured.
        name: String,
        /// Human-readable explanation.
        message: String,
    },

    /// Entity was not found.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"benchmark"`).
        entity: &'static str,
        /// Identifier of the missing entity.
        id: String,
    },

    /// Entity already exists and cannot be registered again.
    #[error("{entity} `{id}` already exists")]
    AlreadyExists {
        /// Entity type name.
        entity: &'static str,
        /// Identifier that conflicts.
        id: String,
    },

    /// The benchmark module does not implement the requested operation.
    #[error("benchmark `{benchmark}` does not support {operation}")]
    Unsupported {
        /// Benchmark name.
        benchmark: String,
        /// Operation name (e.g. `"loading"`).
        operation: &'static str,
    },

    /// Trace file could not be interpreted.
    #[error("trace error: {0}")]
    Trace(String),

    /// A benchmark collaborator failed outside the transaction path.
    #[error("benchmark error: {0}")]
    Collaborator(String),

    /// I/O error while reading configuration or trace files.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The configuration source could not be read or deserialized.
    #[error("configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

impl CoreError {
    /// Creates a `Config` variant.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an `InvalidPhase` variant.
    #[must_use]
    pub fn invalid_phase(phase: usize, message: impl Into<String>) -> Self {
        Self::InvalidPhase {
            phase,
            message: message.into(),
        }
    }

    /// Creates an `InvalidGrouping` variant.
    #[must_use]
    pub fn invalid_grouping(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidGrouping {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an `AlreadyExists` variant.
    #[must_use]
    pub fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    /// Creates an `Unsupported` variant.
    #[must_use]
    pub fn unsupported(benchmark: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            benchmark: benchmark.into(),
            operation,
        }
    }

    /// Returns true when the error was raised while validating configuration.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::InvalidPhase { .. }
                | Self::WeightCountMismatch { .. }
                | Self::InvalidGrouping { .. }
                | Self::Source(_)
        )
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
