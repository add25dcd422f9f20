//! relgate — release gate CLI.
//!
//! Three stages of a release pipeline:
//!
//! ```text
//! relgate canary  --target svc:8080 --health-url http://svc:8080/healthz \
//!                 --correlation-id rel-42 --manifest release/manifest.ext.json
//! relgate promote --manifest release/manifest.ext.json --artifact-root dist \
//!                 --public-key <hex>
//! relgate report  --telemetry canary.jsonl --budgets budgets.toml
//! ```
//!
//! Exit code 0 means the canary passed / promotion verified; 1 means a
//! breach was recorded, promotion was blocked, or configuration/IO
//! failed.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "relgate",
    about = "relgate — canary release gate with signed-artifact promotion",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a timed, rate-limited canary probe window and record the
    /// verdict in the manifest extension.
    Canary(commands::canary::CanaryArgs),
    /// Verify artifact signatures and write the promotion record.
    Promote(commands::promote::PromoteArgs),
    /// Evaluate recorded telemetry against latency budgets.
    Report(commands::report::ReportArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relgate=debug".parse().expect("static filter parses")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Canary(args) => commands::canary::run(args).await,
        Commands::Promote(args) => commands::promote::run(args),
        Commands::Report(args) => commands::report::run(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("relgate: {e:#}");
            ExitCode::FAILURE
        }
    }
}
