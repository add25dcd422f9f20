//! Telemetry events and per-step aggregation.
//!
//! The probe scheduler's metrics sink appends one JSON line per probe;
//! this module reads those lines back and folds them into per-(tool,
//! step) summaries for budget evaluation. Malformed lines are skipped,
//! never fatal — telemetry is best-effort on both ends.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::percentile::percentile;
use crate::{StatsError, StatsResult};

/// One telemetry line: a single probe observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Target identifier (service or deployment name).
    pub tool: String,
    /// Step or capability exercised against the target.
    pub step: String,
    /// Observed latency in milliseconds.
    pub ms: f64,
    /// Whether the probe succeeded.
    pub ok: bool,
    /// Error message for failed probes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

/// Aggregated latency summary for one (tool, step) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    /// Number of observations.
    pub count: usize,
    /// Mean latency in milliseconds.
    pub avg_ms: f64,
    /// 95th-percentile latency in milliseconds.
    pub p95_ms: f64,
    /// Number of failed observations.
    pub error_count: usize,
}

/// Read telemetry events from a JSONL file.
///
/// Lines that fail to parse are skipped silently; an unreadable file is
/// an error.
pub fn read_telemetry(path: &Path) -> StatsResult<Vec<TelemetryEvent>> {
    let content = std::fs::read_to_string(path).map_err(|source| StatsError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let events = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<TelemetryEvent>(line).ok())
        .collect();

    Ok(events)
}

/// Fold telemetry events into per-(tool, step) summaries.
pub fn aggregate(events: &[TelemetryEvent]) -> BTreeMap<(String, String), StepSummary> {
    let mut grouped: BTreeMap<(String, String), Vec<&TelemetryEvent>> = BTreeMap::new();
    for event in events {
        grouped
            .entry((event.tool.clone(), event.step.clone()))
            .or_default()
            .push(event);
    }

    grouped
        .into_iter()
        .map(|(key, group)| {
            let latencies: Vec<f64> = group.iter().map(|e| e.ms).collect();
            let sum: f64 = latencies.iter().sum();
            let summary = StepSummary {
                count: group.len(),
                avg_ms: sum / group.len() as f64,
                p95_ms: percentile(&latencies, 95.0),
                error_count: group.iter().filter(|e| !e.ok).count(),
            };
            (key, summary)
        })
        .collect()
}
