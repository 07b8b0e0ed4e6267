//! Workload definition types and collaborator traits for the OLTP benchmark driver.

pub mod database;
pub mod dialects;
pub mod error;
pub mod grouping;
pub mod outcome;
pub mod phase;
pub mod registry;
pub mod trace;
pub mod traits;
pub mod transaction;
pub mod workload;

pub use database::{DatabaseConfig, DatabaseType, IsolationLevel};
pub use dialects::DialectMap;
pub use error::{CoreError, CoreResult};
pub use grouping::{Grouping, GroupingDecl, RESERVED_GROUPING};
pub use outcome::{OutcomeKind, TransactionStatus};
pub use phase::{Arrival, Phase, PhaseSchedule, PhaseSpec, RateLimit};
pub use registry::{BenchmarkFactory, BenchmarkRegistry};
pub use trace::{TraceEntry, TracePlayback, TraceReader, TraceSource};
pub use traits::{BenchmarkModule, ExecutorError, TransactionExecutor, TransactionRequest};
pub use transaction::{
    TransactionType, TransactionTypeDecl, TransactionTypes, INVALID_TRANSACTION_ID,
};
pub use workload::{
    BenchmarkSection, PerBenchmark, RateValue, WorkDecl, WorkloadConfiguration, WorkloadFile,
};

/// Re-exported so callers can name the workload file format.
pub use config::FileFormat;
