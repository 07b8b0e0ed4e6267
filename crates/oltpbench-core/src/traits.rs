use async_trait::async_trait;
use thiserror::Error;

use crate::dialects::DialectMap;
use crate::error::{CoreError, CoreResult};
use crate::outcome::TransactionStatus;
use crate::phase::Phase;
use crate::transaction::{TransactionType, TransactionTypeDecl};

/// Everything a benchmark needs to execute one transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionRequest<'a> {
    /// Type chosen by the selector or the trace.
    pub transaction: &'a TransactionType,
    /// Recorded parameters when replaying a trace.
    pub params: Option<&'a [String]>,
    /// Phase the request belongs to.
    pub phase: &'a Phase,
    /// True while the phase's warmup window is open; collaborators may skip
    /// their own bookkeeping for these requests.
    pub warmup: bool,
    /// Terminal index within the benchmark.
    pub terminal: usize,
}

/// Failure reported by a transaction executor.
///
/// The worker folds these into outcome kinds; none of them stop the terminal.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Transient conflict (serialization failure, deadlock victim...).
    #[error("transient conflict: {0}")]
    Conflict(String),

    /// Expected application-level rollback.
    #[error("user abort: {0}")]
    UserAbort(String),

    /// Any other database error.
    #[error("database error: {0}")]
    Database(String),

    /// Error from a driver library.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ExecutorError {
    /// Maps the error onto the outcome recorded for the attempt.
    #[must_use]
    pub fn into_status(self) -> TransactionStatus {
        match self {
            Self::Conflict(_) => TransactionStatus::Retry,
            Self::UserAbort(message) => TransactionStatus::UserAbort(Some(message)),
            other => TransactionStatus::UnexpectedError(other.to_string()),
        }
    }
}

/// Executes transactions against the target on behalf of one terminal.
#[async_trait]
pub trait TransactionExecutor: Send {
    /// Runs one transaction and reports its outcome.
    async fn execute(
        &mut self,
        request: &TransactionRequest<'_>,
    ) -> Result<TransactionStatus, ExecutorError>;
}

/// A benchmark's logic as seen by the driver.
#[async_trait]
pub trait BenchmarkModule: Send + Sync {
    /// Benchmark identifier.
    fn name(&self) -> &str;

    /// Transaction types the module implements. When present, every type in
    /// the workload file must appear here.
    fn transaction_types(&self) -> Option<Vec<TransactionTypeDecl>> {
        None
    }

    /// Creates the executor for one terminal. Called once per terminal before
    /// the run starts.
    fn make_executor(&self, terminal: usize) -> CoreResult<Box<dyn TransactionExecutor>>;

    /// Creates the schema.
    async fn create_database(&self) -> CoreResult<()> {
        Err(CoreError::unsupported(self.name(), "schema creation"))
    }

    /// Removes all rows from the benchmark's tables.
    async fn clear_database(&self) -> CoreResult<()> {
        Err(CoreError::unsupported(self.name(), "clearing"))
    }

    /// Bulk-loads data.
    async fn load_database(&self) -> CoreResult<()> {
        Err(CoreError::unsupported(self.name(), "loading"))
    }

    /// Runs a raw script against the target.
    async fn run_script(&self, _script: &str) -> CoreResult<()> {
        Err(CoreError::unsupported(self.name(), "scripts"))
    }

    /// Statement text per procedure, for dialect export.
    fn statement_dialects(&self) -> Option<DialectMap> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_error_classification() {
        assert_eq!(
            ExecutorError::Conflict("40001".into()).into_status(),
            TransactionStatus::Retry
        );
        assert_eq!(
            ExecutorError::UserAbort("item not found".into()).into_status(),
            TransactionStatus::UserAbort(Some("item not found".into()))
        );
        assert!(matches!(
            ExecutorError::Database("connection reset".into()).into_status(),
            TransactionStatus::UnexpectedError(message) if message.contains("connection reset")
        ));
    }
}
