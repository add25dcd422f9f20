//! Latency budgets and violation reports.
//!
//! Budgets are keyed by (tool, step) and loaded from a TOML file:
//!
//! ```toml
//! [budget.deploy-svc.probe]
//! avg_ms = 150.0
//! p95_ms = 400.0
//! ```
//!
//! Evaluation compares each configured budget against the matching
//! step summary and collects one violation per breached metric.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::telemetry::StepSummary;
use crate::{StatsError, StatsResult};

/// Latency budget for one (tool, step) pair. Either metric may be
/// left unconfigured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Budget {
    pub avg_ms: Option<f64>,
    pub p95_ms: Option<f64>,
}

/// All configured budgets, keyed tool → step → budget.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetSet {
    #[serde(default)]
    pub budget: BTreeMap<String, BTreeMap<String, Budget>>,
}

impl BudgetSet {
    /// Load budgets from a TOML file. A missing or unparsable file is
    /// a configuration error.
    pub fn from_file(path: &Path) -> StatsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| StatsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| StatsError::BudgetParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Look up the budget for a (tool, step) pair.
    pub fn get(&self, tool: &str, step: &str) -> Option<&Budget> {
        self.budget.get(tool).and_then(|steps| steps.get(step))
    }
}

/// Which budget metric was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetMetric {
    Avg,
    P95,
}

impl std::fmt::Display for BudgetMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetMetric::Avg => write!(f, "avg"),
            BudgetMetric::P95 => write!(f, "p95"),
        }
    }
}

/// One breached budget metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetViolation {
    pub tool: String,
    pub step: String,
    pub metric: BudgetMetric,
    pub actual: f64,
    pub limit: f64,
}

/// Outcome of evaluating summaries against budgets.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetReport {
    pub violations: Vec<BudgetViolation>,
    pub pass: bool,
}

/// Compare each summary with its configured budget. Steps without a
/// budget are not evaluated; budgets without observations are not
/// violations.
pub fn evaluate_budgets(
    summaries: &BTreeMap<(String, String), StepSummary>,
    budgets: &BudgetSet,
) -> BudgetReport {
    let mut violations = Vec::new();

    for ((tool, step), summary) in summaries {
        let Some(budget) = budgets.get(tool, step) else {
            continue;
        };

        if let Some(limit) = budget.avg_ms
            && summary.avg_ms > limit
        {
            violations.push(BudgetViolation {
                tool: tool.clone(),
                step: step.clone(),
                metric: BudgetMetric::Avg,
                actual: summary.avg_ms,
                limit,
            });
        }

        if let Some(limit) = budget.p95_ms
            && summary.p95_ms > limit
        {
            violations.push(BudgetViolation {
                tool: tool.clone(),
                step: step.clone(),
                metric: BudgetMetric::P95,
                actual: summary.p95_ms,
                limit,
            });
        }
    }

    let pass = violations.is_empty();
    BudgetReport { violations, pass }
}
