//! Writes the exports of a finished run.

use std::io::Write;

use oltpbench_core::WorkloadConfiguration;
use oltpbench_results::{
    write_raw, write_series, OutputTarget, Results, ResultsResult, RunSummary,
};

/// Which exports to produce.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub target: OutputTarget,
    pub raw: bool,
    /// One-second windows in `.samples`.
    pub samples: bool,
    /// Window size for `.res`, in seconds.
    pub window: Option<u64>,
    /// Also write one `.res` per transaction type.
    pub per_type: bool,
}

/// Writes every requested export, then the JSON summary.
pub fn write_reports(
    results: &Results,
    configs: &[&WorkloadConfiguration],
    options: &ReportOptions,
) -> ResultsResult<()> {
    let target = &options.target;

    if options.raw {
        let mut out = target.create(".csv")?;
        write_raw(results, &mut out)?;
        out.flush()?;
    }

    if options.samples {
        let mut out = target.create(".samples")?;
        write_series(&results.series(1, None), &mut out)?;
        out.flush()?;
    }

    if let Some(window) = options.window {
        let mut out = target.create(".res")?;
        write_series(&results.series(window, None), &mut out)?;
        out.flush()?;

        if options.per_type {
            for config in configs {
                for txn in config.transaction_types.iter() {
                    let mut out = target.create(&format!("_{}.res", txn.name()))?;
                    write_series(&results.series(window, Some(txn)), &mut out)?;
                    out.flush()?;
                }
            }
        }
    }

    let summary = RunSummary::new(results, configs);
    let mut out = target.create(".summary")?;
    writeln!(out, "{}", summary.to_json()?)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oltpbench_core::{PhaseSchedule, PhaseSpec, TransactionTypeDecl, TransactionTypes};

    fn config() -> WorkloadConfiguration {
        let decls = [TransactionTypeDecl::named("Read"), TransactionTypeDecl::named("Write")];
        let types = TransactionTypes::from_declarations("noop", &decls, 0).unwrap();
        let mut schedule = PhaseSchedule::new(1, types.len());
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
    fn test_every_export_is_written_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let options = ReportOptions {
            target: OutputTarget::new("run", dir.path(), "t_"),
            raw: true,
            samples: true,
            window: Some(5),
            per_type: true,
        };

        write_reports(&Results::new(), &[&config], &options).unwrap();
        write_reports(&Results::new(), &[&config], &options).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "t_run.1.csv",
                "t_run.1.res",
                "t_run.1.samples",
                "t_run.1.summary",
                "t_run.csv",
                "t_run.res",
                "t_run.samples",
                "t_run.summary",
                "t_run_Read.1.res",
                "t_run_Read.res",
                "t_run_Write.1.res",
                "t_run_Write.res",
            ]
        );

        let raw = std::fs::read_to_string(dir.path().join("t_run.csv")).unwrap();
        assert!(raw.starts_with("Transaction Type Index,Transaction Name"));
        let summary = std::fs::read_to_string(dir.path().join("t_run.summary")).unwrap();
        assert!(summary.contains("\"measured_requests\": 0"));
    }
}
