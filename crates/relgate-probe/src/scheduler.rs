//! Probe scheduler — the paced canary loop.
//!
//! Runs probes serially at the configured rate until the window
//! elapses, guaranteeing at least one sample even for very short or
//! low-rate windows. Pacing is drift-correcting: the sleep after each
//! attempt is shortened by however long the attempt took, and a slow
//! attempt never queues extra delay.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use relgate_stats::{TelemetryEvent, percentile};

use crate::fatal::FatalPatterns;
use crate::invoker::{InvokeOptions, Invoker};
use crate::sink::MetricsSink;

/// Inputs for one canary run, resolved by the caller.
#[derive(Debug, Clone)]
pub struct ProbePlan {
    /// Target identifier (authority the invoker probes).
    pub target: String,
    /// Capability exercised per probe.
    pub capability: String,
    /// Canary window length in seconds.
    pub duration_secs: u64,
    /// Probe rate. The attempt interval is `max(1, floor(1000/qps))`
    /// milliseconds.
    pub qps: f64,
    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
    pub correlation_id: String,
}

/// One recorded probe. Immutable once recorded, appended only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeAttempt {
    pub index: usize,
    /// Unix timestamp (milliseconds) when the attempt started.
    pub started_at: u64,
    pub duration_ms: f64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Aggregate stats for one run, computed once after the loop ends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryRunStats {
    pub session_id: String,
    pub attempts: usize,
    pub successes: usize,
    pub failures: usize,
    pub p95_latency_ms: f64,
    /// failures/attempts, or 1.0 when there are no attempts.
    pub error_rate: f64,
    pub total_duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

/// Run the paced probe loop and return the ordered attempt series plus
/// aggregate stats.
pub async fn run_probes<I: Invoker>(
    plan: &ProbePlan,
    invoker: &I,
    sink: Option<&dyn MetricsSink>,
) -> (Vec<ProbeAttempt>, CanaryRunStats) {
    let interval_ms = ((1000.0 / plan.qps).floor() as u64).max(1);
    let window_ms = plan.duration_secs * 1000;
    let session_id = format!("{}-{}", plan.correlation_id, unix_millis());
    let fatal_patterns = FatalPatterns::default();
    let opts = InvokeOptions {
        timeout: Duration::from_millis(plan.timeout_ms),
        correlation_id: plan.correlation_id.clone(),
    };

    info!(
        target = %plan.target,
        capability = %plan.capability,
        duration_secs = plan.duration_secs,
        qps = plan.qps,
        interval_ms,
        session_id = %session_id,
        "canary probe window starting"
    );

    let run_start = Instant::now();
    let mut attempts: Vec<ProbeAttempt> = Vec::new();
    let mut fatal_error: Option<String> = None;

    loop {
        let elapsed_ms = run_start.elapsed().as_millis() as u64;
        if elapsed_ms >= window_ms && !attempts.is_empty() {
            break;
        }

        let attempt_start = Instant::now();
        let payload = serde_json::json!({
            "correlationId": plan.correlation_id,
            "attempt": attempts.len(),
        });
        let outcome = invoker
            .invoke(&plan.target, &plan.capability, &payload, &opts)
            .await;

        let wall_ms = attempt_start.elapsed().as_secs_f64() * 1000.0;
        let duration_ms = outcome.duration_ms.unwrap_or(wall_ms);

        let attempt = ProbeAttempt {
            index: attempts.len(),
            started_at: unix_millis(),
            duration_ms,
            ok: outcome.ok,
            error_message: outcome.error.clone(),
        };
        attempts.push(attempt);

        if let Some(sink) = sink {
            let event = TelemetryEvent {
                tool: plan.target.clone(),
                step: plan.capability.clone(),
                ms: duration_ms,
                ok: outcome.ok,
                err: outcome.error.clone(),
            };
            // Best-effort: sink failures never affect the run.
            if let Err(e) = sink.log(&event) {
                debug!(error = %e, "metrics sink write failed");
            }
        }

        if !outcome.ok
            && let Some(message) = &outcome.error
            && fatal_patterns.is_fatal(message)
        {
            warn!(error = %message, attempt = attempts.len(), "fatal probe error, stopping window");
            fatal_error = Some(message.clone());
            break;
        }

        let since_attempt_ms = attempt_start.elapsed().as_millis() as u64;
        let delay_ms = interval_ms.saturating_sub(since_attempt_ms);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    let total_duration_ms = run_start.elapsed().as_millis() as u64;
    let stats = compute_stats(&session_id, &attempts, fatal_error, total_duration_ms);

    info!(
        attempts = stats.attempts,
        failures = stats.failures,
        p95_latency_ms = stats.p95_latency_ms,
        error_rate = stats.error_rate,
        "canary probe window finished"
    );

    (attempts, stats)
}

/// Derive aggregate stats from the full attempt series.
fn compute_stats(
    session_id: &str,
    attempts: &[ProbeAttempt],
    fatal_error: Option<String>,
    total_duration_ms: u64,
) -> CanaryRunStats {
    let successes = attempts.iter().filter(|a| a.ok).count();
    let failures = attempts.len() - successes;
    let latencies: Vec<f64> = attempts.iter().map(|a| a.duration_ms).collect();
    let error_rate = if attempts.is_empty() {
        1.0
    } else {
        failures as f64 / attempts.len() as f64
    };

    CanaryRunStats {
        session_id: session_id.to_string(),
        attempts: attempts.len(),
        successes,
        failures,
        p95_latency_ms: percentile(&latencies, 95.0),
        error_rate,
        total_duration_ms,
        fatal_error,
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
