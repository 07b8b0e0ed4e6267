//! Workload configuration.
//!
//! The workload file is read through the `config` crate (YAML, TOML or JSON,
//! chosen by extension) with `OLTPBENCH__*` environment overrides, then turned
//! into one validated [`WorkloadConfiguration`] per benchmark:
//!
//! ```yaml
//! type: postgres
//! driver: postgresql
//! url: postgres://localhost/bench
//! terminals: 10
//! transaction_types:
//!   - name: NewOrder
//!   - name: Payment
//! works:
//!   - time: 60
//!     warmup: 5
//!     rate: 100
//!     arrival: poisson
//!     weights: [60, 40]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::database::{DatabaseConfig, DatabaseType, IsolationLevel};
use crate::dialects::DialectMap;
use crate::error::{CoreError, CoreResult};
use crate::grouping::{Grouping, GroupingDecl};
use crate::phase::{Arrival, PhaseSchedule, PhaseSpec};
use crate::trace::{TracePlayback, TraceSource};
use crate::traits::BenchmarkModule;
use crate::transaction::{TransactionTypeDecl, TransactionTypes};

/// Prefix for environment overrides, e.g. `OLTPBENCH__TERMINALS=8`.
pub const ENV_PREFIX: &str = "OLTPBENCH";

/// Default bound on overdue arrivals per terminal before the run aborts.
pub const DEFAULT_QUEUE_LIMIT: usize = 10_000;

/// Default time terminals get to stop after the last phase.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 10_000;

fn default_batch_size() -> usize {
    128
}

fn default_pool_size() -> usize {
    12
}

fn default_scale_factor() -> f64 {
    1.0
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_queue_limit() -> usize {
    DEFAULT_QUEUE_LIMIT
}

fn default_grace_period_ms() -> u64 {
    DEFAULT_GRACE_PERIOD_MS
}

/// A value given once for every benchmark or keyed by benchmark name.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PerBenchmark<T> {
    Shared(T),
    Keyed(BTreeMap<String, T>),
}

impl<T: Clone> PerBenchmark<T> {
    /// The value for `benchmark`; keyed lookups are case-insensitive.
    pub fn resolve(&self, benchmark: &str) -> Option<T> {
        match self {
            Self::Shared(value) => Some(value.clone()),
            Self::Keyed(map) => map
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(benchmark))
                .map(|(_, value)| value.clone()),
        }
    }
}

/// Rate as written in the file: a keyword or a number.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RateValue {
    Number(i64),
    Text(String),
}

impl RateValue {
    fn as_rate_string(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// One `works` entry of the workload file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct WorkDecl {
    /// Measured seconds; 0 for an untimed serial pass.
    #[serde(default)]
    pub time: u64,

    #[serde(default)]
    pub warmup: i64,

    #[serde(default)]
    pub rate: Option<PerBenchmark<RateValue>>,

    #[serde(default)]
    pub arrival: Option<String>,

    #[serde(default)]
    pub serial: bool,

    #[serde(default)]
    pub active_terminals: Option<PerBenchmark<usize>>,

    #[serde(default)]
    pub weights: Option<PerBenchmark<Vec<f64>>>,
}

impl WorkDecl {
    fn to_spec(&self, number: usize, benchmark: &str) -> CoreResult<PhaseSpec> {
        let rate = self
            .rate
            .as_ref()
            .and_then(|r| r.resolve(benchmark))
            .map(|r| r.as_rate_string())
            .unwrap_or_default();
        if rate.trim().is_empty() {
            return Err(CoreError::invalid_phase(
                number,
                format!("please specify the rate for phase {number} and workload {benchmark}"),
            ));
        }

        let arrival = match &self.arrival {
            Some(value) => value
                .parse::<Arrival>()
                .map_err(|e| CoreError::invalid_phase(number, e.to_string()))?,
            None => Arrival::Regular,
        };

        Ok(PhaseSpec {
            duration_secs: self.time,
            warmup_secs: self.warmup,
            rate,
            arrival,
            serial: self.serial,
            active_terminals: self
                .active_terminals
                .as_ref()
                .and_then(|a| a.resolve(benchmark)),
            weights: self
                .weights
                .as_ref()
                .and_then(|w| w.resolve(benchmark))
                .unwrap_or_default(),
        })
    }
}

/// Settings that may be overridden for one benchmark.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct BenchmarkSection {
    #[serde(default)]
    pub terminals: Option<usize>,

    #[serde(default)]
    pub isolation: Option<String>,

    #[serde(default)]
    pub transaction_types: Vec<TransactionTypeDecl>,

    #[serde(default)]
    pub groupings: Vec<GroupingDecl>,
}

/// Deserialized workload file, before validation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkloadFile {
    #[serde(rename = "type")]
    pub db_type: String,

    pub driver: String,

    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default)]
    pub terminals: usize,

    #[serde(default)]
    pub loader_threads: Option<usize>,

    #[serde(default)]
    pub isolation: Option<String>,

    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,

    #[serde(default)]
    pub record_abort_messages: bool,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub selectivity: Option<f64>,

    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,

    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Base seed for per-terminal random generators.
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub transaction_types: Vec<TransactionTypeDecl>,

    #[serde(default)]
    pub groupings: Vec<GroupingDecl>,

    #[serde(default)]
    pub benchmarks: BTreeMap<String, BenchmarkSection>,

    #[serde(default)]
    pub works: Vec<WorkDecl>,
}

impl WorkloadFile {
    /// Loads a workload file, applying `OLTPBENCH__*` environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parses a workload definition held in memory.
    pub fn from_contents(contents: &str, format: FileFormat) -> CoreResult<Self> {
        let config = Config::builder()
            .add_source(File::from_str(contents, format))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn section(&self, benchmark: &str) -> Option<&BenchmarkSection> {
        self.benchmarks
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(benchmark))
            .map(|(_, section)| section)
    }

    fn database(&self) -> CoreResult<DatabaseConfig> {
        if self.pool_size == 0 {
            return Err(CoreError::config("pool_size must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(CoreError::config("batch_size must be > 0"));
        }
        Ok(DatabaseConfig {
            db_type: self.db_type.parse::<DatabaseType>()?,
            driver: self.driver.clone(),
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            batch_size: self.batch_size,
            pool_size: self.pool_size,
        })
    }

    /// Validates the file for the named benchmarks, in order.
    ///
    /// Transaction ids of each benchmark are offset by the largest id handed
    /// out to the benchmarks before it.
    pub fn build(
        &self,
        benchmarks: &[String],
        trace: Option<&TraceSource>,
    ) -> CoreResult<Vec<WorkloadConfiguration>> {
        if benchmarks.is_empty() {
            return Err(CoreError::config("missing benchmark to run"));
        }
        let database = self.database()?;
        let single = benchmarks.len() == 1;
        let mut id_offset = 0u32;
        let mut configs = Vec::with_capacity(benchmarks.len());

        for name in benchmarks {
            let section = self.section(name).cloned().unwrap_or_default();

            let terminals = section.terminals.unwrap_or(self.terminals);
            if terminals == 0 {
                return Err(CoreError::config(format!(
                    "benchmark {name}: terminals must be at least 1"
                )));
            }

            let isolation = match section.isolation.as_ref().or(self.isolation.as_ref()) {
                Some(level) => level.parse::<IsolationLevel>()?,
                None => IsolationLevel::default(),
            };

            let decls = if !section.transaction_types.is_empty() {
                &section.transaction_types
            } else if single {
                &self.transaction_types
            } else {
                &section.transaction_types
            };
            if decls.is_empty() {
                return Err(CoreError::config(format!(
                    "no transaction types declared for benchmark {name}"
                )));
            }
            let types = TransactionTypes::from_declarations(name, decls, id_offset)?;
            id_offset = id_offset.max(types.max_id());

            let grouping_decls = if !section.groupings.is_empty() || !single {
                &section.groupings
            } else {
                &self.groupings
            };
            let groupings = grouping_decls
                .iter()
                .map(|g| Grouping::new(&g.name, g.weights.clone(), types.len()))
                .collect::<CoreResult<Vec<_>>>()?;

            let mut phases =
                PhaseSchedule::new(terminals, types.len()).trace_driven(trace.is_some());
            for (position, work) in self.works.iter().enumerate() {
                phases.add_phase(work.to_spec(position + 1, name)?)?;
            }
            phases.validate_all()?;

            let trace = trace.map(|source| source.load(&types)).transpose()?;

            configs.push(WorkloadConfiguration {
                benchmark: name.clone(),
                database: database.clone(),
                isolation,
                scale_factor: self.scale_factor,
                terminals,
                loader_threads: self.loader_threads.unwrap_or_else(default_loader_threads),
                record_abort_messages: self.record_abort_messages,
                data_dir: self.data_dir.clone(),
                selectivity: self.selectivity,
                queue_limit: self.queue_limit,
                grace_period: Duration::from_millis(self.grace_period_ms),
                seed: self.seed,
                transaction_types: Arc::new(types),
                groupings,
                phases,
                trace: trace.map(Arc::new),
                dialects: OnceCell::new(),
            });
        }

        Ok(configs)
    }
}

fn default_loader_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Validated, immutable configuration of one benchmark in a run.
#[derive(Debug)]
pub struct WorkloadConfiguration {
    pub benchmark: String,
    pub database: DatabaseConfig,
    pub isolation: IsolationLevel,
    pub scale_factor: f64,
    pub terminals: usize,
    pub loader_threads: usize,
    /// Keep the free-text reason of user aborts in a separate histogram.
    pub record_abort_messages: bool,
    pub data_dir: PathBuf,
    pub selectivity: Option<f64>,
    /// Overdue arrivals a terminal may accumulate before the run aborts.
    pub queue_limit: usize,
    /// Time terminals get to stop once the last phase ends.
    pub grace_period: Duration,
    pub seed: u64,
    pub transaction_types: Arc<TransactionTypes>,
    pub groupings: Vec<Grouping>,
    pub phases: PhaseSchedule,
    /// Recorded transactions that replace random selection.
    pub trace: Option<Arc<TracePlayback>>,
    dialects: OnceCell<Option<DialectMap>>,
}

impl WorkloadConfiguration {
    /// Configuration assembled in code rather than read from a file.
    ///
    /// The schedule is validated against the registry here as well.
    pub fn new(
        benchmark: impl Into<String>,
        transaction_types: TransactionTypes,
        phases: PhaseSchedule,
    ) -> CoreResult<Self> {
        phases.validate_all()?;
        Ok(Self {
            benchmark: benchmark.into(),
            database: DatabaseConfig {
                db_type: DatabaseType::Postgres,
                driver: String::new(),
                url: String::new(),
                username: String::new(),
                password: String::new(),
                batch_size: default_batch_size(),
                pool_size: default_pool_size(),
            },
            isolation: IsolationLevel::default(),
            scale_factor: default_scale_factor(),
            terminals: phases.terminals(),
            loader_threads: 1,
            record_abort_messages: false,
            data_dir: default_data_dir(),
            selectivity: None,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            grace_period: Duration::from_millis(DEFAULT_GRACE_PERIOD_MS),
            seed: 0,
            transaction_types: Arc::new(transaction_types),
            groupings: Vec::new(),
            phases,
            trace: None,
            dialects: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = queue_limit;
        self
    }

    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    #[must_use]
    pub fn with_record_abort_messages(mut self, enabled: bool) -> Self {
        self.record_abort_messages = enabled;
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: TracePlayback) -> Self {
        self.trace = Some(Arc::new(trace));
        self
    }

    /// Number of declared transaction types.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.transaction_types.len()
    }

    /// Statement dialects of `module`, derived on first use and cached.
    pub fn dialects(&self, module: &dyn BenchmarkModule) -> Option<&DialectMap> {
        self.dialects
            .get_or_init(|| module.statement_dialects())
            .as_ref()
    }

    /// Key/value pairs for the startup banner.
    #[must_use]
    pub fn banner(&self) -> Vec<(&'static str, String)> {
        let mut lines = vec![
            ("Benchmark", self.benchmark.to_uppercase()),
            ("Type", self.database.db_type.to_string()),
            ("Driver", self.database.driver.clone()),
            ("URL", self.database.url.clone()),
            ("Pool Size", self.database.pool_size.to_string()),
            ("Isolation", self.isolation.to_string()),
            ("Scale Factor", self.scale_factor.to_string()),
            ("Terminals", self.terminals.to_string()),
        ];
        if let Some(selectivity) = self.selectivity {
            lines.push(("Selectivity", selectivity.to_string()));
        }
        lines
    }
}
