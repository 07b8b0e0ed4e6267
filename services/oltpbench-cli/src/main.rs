use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::{ArgAction, Parser};
use oltpbench_core::{
    BenchmarkModule, CoreError, TraceSource, WorkloadConfiguration, WorkloadFile,
};
use oltpbench_driver::{BenchmarkRun, Dispatcher};
use oltpbench_results::{render_histograms, OutputTarget, RunSummary, SEPARATOR};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod benchmarks;
mod report;

use report::{write_reports, ReportOptions};

#[derive(Parser, Debug)]
#[command(name = "oltpbench")]
#[command(about = "Rate-controlled multi-terminal database workload driver", long_about = None)]
#[command(version)]
struct Cli {
    /// Benchmarks to run, comma separated
    #[arg(short = 'b', long = "bench")]
    bench: String,

    /// Workload configuration file (YAML, TOML or JSON)
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Create the schema
    #[arg(long)]
    create: bool,

    /// Remove all rows from the benchmark's tables
    #[arg(long)]
    clear: bool,

    /// Load data
    #[arg(long)]
    load: bool,

    /// Execute the workload
    #[arg(long)]
    execute: bool,

    /// Run a script against the target
    #[arg(long, value_name = "FILE")]
    runscript: Option<PathBuf>,

    /// Write windowed throughput with this window size, in seconds
    #[arg(short = 's', long = "sample", value_name = "W")]
    sample: Option<u64>,

    /// Also write one windowed summary per transaction type
    #[arg(long = "ss")]
    per_type_samples: bool,

    /// Log progress every N milliseconds while executing
    #[arg(long = "im", alias = "interval-monitor", value_name = "MS")]
    interval_monitor: Option<u64>,

    /// Base name of the output files; "-" writes to stdout
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Output directory
    #[arg(short = 'd', long = "directory", default_value = "results")]
    directory: PathBuf,

    /// Prefix output files with the start time
    #[arg(short = 't', long = "timestamp")]
    timestamp: bool,

    /// Replay a trace: operations file, then arguments file
    #[arg(long, num_args = 2, value_names = ["OPS", "ARGS"])]
    tracescript: Option<Vec<PathBuf>>,

    /// Print the outcome histograms
    #[arg(long)]
    histograms: bool,

    /// Export the per-statement SQL dialects as JSON
    #[arg(long = "dialects-export")]
    dialects_export: bool,

    /// Write the raw per-transaction CSV
    #[arg(long = "output-raw", default_value_t = true, action = ArgAction::Set)]
    output_raw: bool,

    /// Write one-second windows to a .samples file
    #[arg(long = "output-samples")]
    output_samples: bool,
}

impl Cli {
    fn benchmarks(&self) -> Vec<String> {
        self.bench
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn trace(&self) -> Option<TraceSource> {
        match self.tracescript.as_deref() {
            Some([operations, arguments]) => Some(TraceSource::new(operations, arguments)),
            _ => None,
        }
    }

    fn has_action(&self) -> bool {
        self.create
            || self.clear
            || self.load
            || self.execute
            || self.runscript.is_some()
            || self.dialects_export
    }

    fn report_options(&self) -> Option<ReportOptions> {
        let output = self.output.as_deref()?;
        let prefix = if self.timestamp {
            Local::now().format("%Y-%m-%d_%H-%M-%S_").to_string()
        } else {
            String::new()
        };
        Some(ReportOptions {
            target: OutputTarget::new(output, &self.directory, prefix),
            raw: self.output_raw,
            samples: self.output_samples,
            window: self.sample,
            per_type: self.per_type_samples,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();
    if !cli.has_action() {
        warn!(
            "Nothing to do: pass --create, --clear, --load, --execute, --runscript \
             or --dialects-export"
        );
        return Ok(());
    }

    let file = WorkloadFile::load(&cli.config)?;
    let configs = file.build(&cli.benchmarks(), cli.trace().as_ref())?;
    let registry = benchmarks::registry()?;

    let mut runs = Vec::with_capacity(configs.len());
    for config in configs {
        log_banner(&config);
        let module = registry.create(&config)?;
        runs.push(BenchmarkRun::new(Arc::new(config), module));
    }

    for run in &runs {
        prepare(&cli, &run.config, run.module.as_ref()).await?;
    }

    if !cli.execute {
        info!("Skipping benchmark workload execution");
        return Ok(());
    }

    let mut dispatcher = Dispatcher::new(runs.clone());
    if let Some(ms) = cli.interval_monitor {
        dispatcher = dispatcher.with_interval_monitor(Duration::from_millis(ms));
    }
    let report = dispatcher.run().await?;
    let configs: Vec<&WorkloadConfiguration> = runs.iter().map(|r| r.config.as_ref()).collect();

    info!("Run summary:\n{}", RunSummary::new(&report.results, &configs));
    if cli.histograms {
        info!("Workload histograms:\n{}", render_histograms(&report.results));
    }
    match cli.report_options() {
        Some(options) => write_reports(&report.results, &configs, &options)?,
        None => info!("No output file specified"),
    }

    if let Some(fault) = report.fault {
        error!(%fault, "Run aborted; collected results were written");
        std::process::exit(1);
    }
    Ok(())
}

/// Runs the lifecycle steps requested before execution, in order.
async fn prepare(
    cli: &Cli,
    config: &WorkloadConfiguration,
    module: &dyn BenchmarkModule,
) -> Result<(), CoreError> {
    let benchmark = config.benchmark.to_uppercase();

    if cli.dialects_export {
        match config.dialects(module) {
            Some(dialects) => {
                let json = dialects
                    .export()
                    .map_err(|e| CoreError::Collaborator(e.to_string()))?;
                println!("{json}");
            }
            None => warn!(benchmark = %benchmark, "No dialects to export"),
        }
    }
    if cli.create {
        info!(benchmark = %benchmark, "Creating new database");
        module.create_database().await?;
    }
    if cli.clear {
        info!(benchmark = %benchmark, "Clearing database");
        module.clear_database().await?;
    }
    if cli.load {
        info!(benchmark = %benchmark, "Loading data into database");
        module.load_database().await?;
    }
    if let Some(path) = &cli.runscript {
        info!(benchmark = %benchmark, script = %path.display(), "Running script");
        let script = tokio::fs::read_to_string(path).await?;
        module.run_script(&script).await?;
    }
    Ok(())
}

fn log_banner(config: &WorkloadConfiguration) {
    let mut banner = String::new();
    for (key, value) in config.banner() {
        banner.push_str(&format!("\n{:<13}{}", format!("{key}:"), value));
    }
    info!("{SEPARATOR}{banner}\n{SEPARATOR}");
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_full_command_line() {
        let cli = Cli::try_parse_from([
            "oltpbench",
            "-b",
            "tpcc, noop",
            "-c",
            "workload.yaml",
            "--execute",
            "-s",
            "5",
            "--ss",
            "--im",
            "1000",
            "-o",
            "run",
            "--tracescript",
            "ops.txt",
            "args.txt",
            "--output-raw",
            "false",
        ])
        .unwrap();

        assert_eq!(cli.benchmarks(), vec!["tpcc", "noop"]);
        assert!(cli.execute && cli.per_type_samples && cli.has_action());
        assert_eq!(cli.sample, Some(5));
        assert_eq!(cli.interval_monitor, Some(1000));
        assert_eq!(cli.directory, PathBuf::from("results"));
        assert_eq!(cli.trace().unwrap().operations, PathBuf::from("ops.txt"));

        let options = cli.report_options().unwrap();
        assert!(!options.raw);
        assert_eq!(options.window, Some(5));
    }

    #[test]
    fn test_dash_output_goes_to_stdout() {
        let cli =
            Cli::try_parse_from(["oltpbench", "-b", "noop", "-c", "w.yaml", "-o", "-"]).unwrap();
        assert!(cli.output_raw);
        assert!(!cli.has_action());
        assert_eq!(cli.report_options().unwrap().target, OutputTarget::Stdout);
    }

    #[test]
    fn test_tracescript_needs_two_files() {
        assert!(Cli::try_parse_from([
            "oltpbench",
            "-b",
            "noop",
            "-c",
            "w.yaml",
            "--tracescript",
            "ops.txt",
        ])
        .is_err());
    }
}
