//! `relgate report` — evaluate recorded telemetry against budgets.

use std::path::PathBuf;
use std::process::ExitCode;

use relgate_stats::{BudgetSet, aggregate, evaluate_budgets, read_telemetry};

#[derive(clap::Args)]
pub struct ReportArgs {
    /// Telemetry JSONL file written by the canary sink.
    #[arg(long, env = "RELGATE_TELEMETRY")]
    pub telemetry: PathBuf,

    /// Budget TOML file keyed [budget.<tool>.<step>].
    #[arg(long, env = "RELGATE_BUDGETS")]
    pub budgets: PathBuf,

    /// Also print a machine-readable JSON payload.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ReportArgs) -> anyhow::Result<ExitCode> {
    let events = read_telemetry(&args.telemetry)?;
    let summaries = aggregate(&events);
    let budgets = BudgetSet::from_file(&args.budgets)?;
    let report = evaluate_budgets(&summaries, &budgets);

    for ((tool, step), summary) in &summaries {
        println!(
            "{tool}/{step}: {} samples, avg {:.1}ms, p95 {:.1}ms, {} error(s)",
            summary.count, summary.avg_ms, summary.p95_ms, summary.error_count
        );
    }
    for violation in &report.violations {
        println!(
            "budget violation: {}/{} {} {:.1} > {:.1}",
            violation.tool, violation.step, violation.metric, violation.actual, violation.limit
        );
    }

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "pass": report.pass,
                "violations": report.violations,
            })
        );
    }

    if report.pass {
        println!("all budgets respected");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
