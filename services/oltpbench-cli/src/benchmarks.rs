//! Benchmarks compiled into the binary.
//!
//! `noop` drives the full scheduling and reporting path without a database:
//! every transaction waits for a slot in a bounded pool, holds it for a fixed
//! service time and commits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oltpbench_core::{
    BenchmarkModule, BenchmarkRegistry, CoreResult, DatabaseType, DialectMap, ExecutorError,
    TransactionExecutor, TransactionRequest, TransactionStatus, WorkloadConfiguration,
};
use tokio::sync::Semaphore;
use tracing::info;

/// Time each noop transaction holds its pooled connection.
const NOOP_SERVICE_TIME: Duration = Duration::from_millis(1);

/// Every benchmark this build can run.
pub fn registry() -> CoreResult<BenchmarkRegistry> {
    BenchmarkRegistry::new().with("noop", NoopBenchmark::create)
}

pub struct NoopBenchmark {
    db_type: DatabaseType,
    transactions: Vec<String>,
    pool: Arc<Semaphore>,
}

impl NoopBenchmark {
    fn create(config: &WorkloadConfiguration) -> CoreResult<Arc<dyn BenchmarkModule>> {
        Ok(Arc::new(Self {
            db_type: config.database.db_type,
            transactions: config
                .transaction_types
                .iter()
                .map(|txn| txn.name().to_string())
                .collect(),
            pool: Arc::new(Semaphore::new(config.database.pool_size.max(1))),
        }))
    }
}

#[async_trait]
impl BenchmarkModule for NoopBenchmark {
    fn name(&self) -> &str {
        "noop"
    }

    fn make_executor(&self, _terminal: usize) -> CoreResult<Box<dyn TransactionExecutor>> {
        Ok(Box::new(NoopExecutor {
            pool: Arc::clone(&self.pool),
        }))
    }

    async fn create_database(&self) -> CoreResult<()> {
        info!(benchmark = "noop", "Nothing to create");
        Ok(())
    }

    async fn clear_database(&self) -> CoreResult<()> {
        info!(benchmark = "noop", "Nothing to clear");
        Ok(())
    }

    async fn load_database(&self) -> CoreResult<()> {
        info!(benchmark = "noop", "Nothing to load");
        Ok(())
    }

    async fn run_script(&self, script: &str) -> CoreResult<()> {
        let statements = script.split(';').filter(|s| !s.trim().is_empty()).count();
        info!(benchmark = "noop", statements, "Skipping script");
        Ok(())
    }

    fn statement_dialects(&self) -> Option<DialectMap> {
        let mut dialects = DialectMap::new(self.db_type);
        for name in &self.transactions {
            dialects.insert(name.as_str(), "stmt", "SELECT 1");
        }
        Some(dialects)
    }
}

struct NoopExecutor {
    pool: Arc<Semaphore>,
}

#[async_trait]
impl TransactionExecutor for NoopExecutor {
    async fn execute(
        &mut self,
        _request: &TransactionRequest<'_>,
    ) -> Result<TransactionStatus, ExecutorError> {
        let _connection = self
            .pool
            .acquire()
            .await
            .map_err(|e| ExecutorError::Database(e.to_string()))?;
        tokio::time::sleep(NOOP_SERVICE_TIME).await;
        Ok(TransactionStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oltpbench_core::{PhaseSchedule, PhaseSpec, TransactionTypeDecl, TransactionTypes};

    fn config() -> WorkloadConfiguration {
        let decls = [TransactionTypeDecl::named("Read"), TransactionTypeDecl::named("Write")];
        let types = TransactionTypes::from_declarations("noop", &decls, 0).unwrap();
        let mut schedule = PhaseSchedule::new(2, types.len());
        schedule
            .add_phase(PhaseSpec {
                duration_secs: 1,
                weights: vec![1.0, 1.0],
                ..Default::default()
            })
            .unwrap();
        WorkloadConfiguration::new("noop", types, schedule).unwrap()
    }

    #[test]
    fn test_registry_resolves_noop() {
        let registry = registry().unwrap();
        assert!(registry.contains("NOOP"));
        assert_eq!(registry.create(&config()).unwrap().name(), "noop");
    }

    #[test]
    fn test_dialects_cover_every_transaction() {
        let config = config();
        let module = registry().unwrap().create(&config).unwrap();
        let dialects = config.dialects(module.as_ref()).unwrap();
        assert_eq!(dialects.statement("Read", "stmt"), Some("SELECT 1"));
        assert_eq!(dialects.statement("Write", "stmt"), Some("SELECT 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_commits() {
        let config = config();
        let module = registry().unwrap().create(&config).unwrap();
        let mut executor = module.make_executor(0).unwrap();
        let txn = config.transaction_types.get(0).unwrap();
        let phase = &config.phases.phases()[0];
        let request = TransactionRequest {
            transaction: txn,
            params: None,
            phase,
            warmup: false,
            terminal: 0,
        };
        assert_eq!(executor.execute(&request).await.unwrap(), TransactionStatus::Success);
    }
}
