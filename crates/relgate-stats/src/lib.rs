//! relgate-stats — latency statistics for the release gate.
//!
//! Pure computation over probe latencies and telemetry events:
//!
//! - **`percentile`** — linear-interpolation percentiles
//! - **`telemetry`** — JSONL telemetry events and per-step aggregation
//! - **`budget`** — latency budgets and violation reports
//!
//! No network or manifest I/O lives here; the only file access is
//! reading telemetry lines and the budget config.

pub mod budget;
pub mod percentile;
pub mod telemetry;

pub use budget::{Budget, BudgetMetric, BudgetReport, BudgetSet, BudgetViolation, evaluate_budgets};
pub use percentile::percentile;
pub use telemetry::{StepSummary, TelemetryEvent, aggregate, read_telemetry};

use thiserror::Error;

/// Result type alias for statistics operations.
pub type StatsResult<T> = Result<T, StatsError>;

/// Errors from telemetry reading or budget loading.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid budget file {path}: {message}")]
    BudgetParse { path: String, message: String },
}
