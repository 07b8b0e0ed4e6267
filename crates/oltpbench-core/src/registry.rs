//! Static benchmark registry: identifier to module factory.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::traits::BenchmarkModule;
use crate::workload::WorkloadConfiguration;

/// Builds a benchmark module for a validated workload configuration.
pub type BenchmarkFactory = fn(&WorkloadConfiguration) -> CoreResult<Arc<dyn BenchmarkModule>>;

/// Table of benchmarks known to this build.
#[derive(Default)]
pub struct BenchmarkRegistry {
    factories: BTreeMap<String, BenchmarkFactory>,
}

impl BenchmarkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under a case-insensitive name.
    pub fn register(&mut self, name: &str, factory: BenchmarkFactory) -> CoreResult<()> {
        let key = name.to_lowercase();
        if self.factories.contains_key(&key) {
            return Err(CoreError::already_exists("benchmark", key));
        }
        self.factories.insert(key, factory);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, name: &str, factory: BenchmarkFactory) -> CoreResult<Self> {
        self.register(name, factory)?;
        Ok(self)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiates the module for `config.benchmark` and checks that it
    /// implements every configured transaction type.
    pub fn create(&self, config: &WorkloadConfiguration) -> CoreResult<Arc<dyn BenchmarkModule>> {
        let factory = self
            .factories
            .get(&config.benchmark.to_lowercase())
            .ok_or_else(|| CoreError::not_found("benchmark", &config.benchmark))?;
        let module = factory(config)?;

        if let Some(known) = module.transaction_types() {
            for txn in config.transaction_types.iter() {
                if !known.iter().any(|decl| decl.name.eq_ignore_ascii_case(txn.name())) {
                    return Err(CoreError::not_found("transaction type", txn.name()));
                }
            }
        }
        Ok(module)
    }
}
