//! `relgate canary` — run the gate and persist the verdict.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::bail;

use relgate_manifest::{CanaryAnnotation, ManifestStore, store::now_rfc3339};
use relgate_probe::{
    GateThresholds, HealthGate, HealthProbe, HttpInvoker, Invoker, JsonlSink, MetricsSink,
    ProbePlan, evaluate,
};

#[derive(clap::Args)]
pub struct CanaryArgs {
    /// Target authority probed per attempt (host:port).
    #[arg(long, env = "RELGATE_TARGET")]
    pub target: String,

    /// Capability path exercised per probe.
    #[arg(long, env = "RELGATE_CAPABILITY", default_value = "probe")]
    pub capability: String,

    /// Canary window length in seconds.
    #[arg(long, env = "RELGATE_DURATION_SECS", default_value = "60")]
    pub duration_secs: u64,

    /// Probe rate (attempts per second).
    #[arg(long, env = "RELGATE_QPS", default_value = "1.0")]
    pub qps: f64,

    /// Breach when p95 latency exceeds this many milliseconds.
    #[arg(long, env = "RELGATE_P95_THRESHOLD_MS", default_value = "400.0")]
    pub p95_threshold_ms: f64,

    /// Breach when the error rate exceeds this fraction (0-1).
    #[arg(long, env = "RELGATE_MAX_ERROR_RATE", default_value = "0.05")]
    pub max_error_rate: f64,

    /// Per-probe timeout in milliseconds.
    #[arg(long, env = "RELGATE_PROBE_TIMEOUT_MS", default_value = "2000")]
    pub probe_timeout_ms: u64,

    /// Health endpoint checked before and after the window.
    #[arg(long, env = "RELGATE_HEALTH_URL")]
    pub health_url: String,

    /// Health check timeout in milliseconds.
    #[arg(long, env = "RELGATE_HEALTH_TIMEOUT_MS", default_value = "2000")]
    pub health_timeout_ms: u64,

    /// Manifest extension file recording the verdict.
    #[arg(long, env = "RELGATE_MANIFEST", default_value = "release/manifest.ext.json")]
    pub manifest: PathBuf,

    /// Optional telemetry JSONL sink, one line per attempt.
    #[arg(long, env = "RELGATE_TELEMETRY")]
    pub telemetry: Option<PathBuf>,

    /// Release correlation identifier.
    #[arg(long, env = "RELGATE_CORRELATION_ID")]
    pub correlation_id: String,

    /// Agent recorded in rollback audit entries.
    #[arg(long, env = "RELGATE_AGENT", default_value = "relgate")]
    pub agent: String,

    /// Also print a machine-readable JSON payload.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: CanaryArgs) -> anyhow::Result<ExitCode> {
    if args.qps <= 0.0 {
        bail!("--qps must be positive");
    }
    if !(0.0..=1.0).contains(&args.max_error_rate) {
        bail!("--max-error-rate must be within [0, 1]");
    }

    let plan = ProbePlan {
        target: args.target.clone(),
        capability: args.capability.clone(),
        duration_secs: args.duration_secs,
        qps: args.qps,
        timeout_ms: args.probe_timeout_ms,
        correlation_id: args.correlation_id.clone(),
    };
    let thresholds = GateThresholds {
        p95_threshold_ms: args.p95_threshold_ms,
        max_error_rate: args.max_error_rate,
    };
    let health = HealthGate::new(
        args.health_url.clone(),
        Duration::from_millis(args.health_timeout_ms),
    );
    let store = ManifestStore::new(&args.manifest);
    let sink = args.telemetry.as_ref().map(JsonlSink::new);

    let passed = execute(
        &plan,
        &thresholds,
        &store,
        &health,
        &HttpInvoker,
        sink.as_ref().map(|s| s as &dyn MetricsSink),
        &args.agent,
        args.json,
    )
    .await?;

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Gate, then persist: rollback entry on breach, canary annotation on
/// a pass. Returns whether the gate passed. Separated from `run` so
/// tests can inject collaborators.
#[allow(clippy::too_many_arguments)]
async fn execute<I, H>(
    plan: &ProbePlan,
    thresholds: &GateThresholds,
    store: &ManifestStore,
    health: &H,
    invoker: &I,
    sink: Option<&dyn MetricsSink>,
    agent: &str,
    json: bool,
) -> anyhow::Result<bool>
where
    I: Invoker,
    H: HealthProbe,
{
    let decision = evaluate(plan, thresholds, health, invoker, sink).await;
    let stats_value = decision
        .stats
        .as_ref()
        .and_then(|s| serde_json::to_value(s).ok());

    if json {
        println!(
            "{}",
            serde_json::json!({
                "passed": decision.passed(),
                "breaches": decision.breaches,
                "stats": stats_value,
            })
        );
    }

    if decision.passed() {
        // A pass implies probing ran, so stats are present.
        let Some(stats) = &decision.stats else {
            bail!("gate passed without run stats");
        };
        let annotation = CanaryAnnotation {
            status: "canary-ok".to_string(),
            ts: now_rfc3339(),
            correlation_id: plan.correlation_id.clone(),
            session_id: stats.session_id.clone(),
            attempts: stats.attempts,
            successes: stats.successes,
            failures: stats.failures,
            p95: stats.p95_latency_ms,
            error_rate: stats.error_rate,
            duration_ms: stats.total_duration_ms,
        };
        store.annotate_success(&annotation)?;

        println!(
            "canary passed: {} attempts, p95 {:.1}ms, error rate {:.3}",
            stats.attempts, stats.p95_latency_ms, stats.error_rate
        );
        Ok(true)
    } else {
        let reason = decision.breaches.join("; ");
        store.record_rollback(&plan.correlation_id, &reason, agent, stats_value)?;

        println!("canary breached: {reason} (rollback recorded)");
        Ok(false)
    }
}
