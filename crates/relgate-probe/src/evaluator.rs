//! Breach evaluator — turns health readings and probe stats into a
//! pass/fail decision.
//!
//! Decision order is fixed: preflight health (unhealthy skips probing
//! entirely), then sample presence, fatal errors, p95, error rate, and
//! finally a postflight health check that only runs on an otherwise
//! clean window — it catches target degradation caused by the canary
//! load itself. Breaches accumulate; the list is ordered.

use tracing::{info, warn};

use crate::health::HealthProbe;
use crate::invoker::Invoker;
use crate::scheduler::{CanaryRunStats, ProbeAttempt, ProbePlan, run_probes};
use crate::sink::MetricsSink;

/// Latency and error-rate limits for the gate.
#[derive(Debug, Clone)]
pub struct GateThresholds {
    /// Maximum allowed p95 latency in milliseconds.
    pub p95_threshold_ms: f64,
    /// Maximum allowed error rate in [0, 1].
    pub max_error_rate: f64,
}

/// Outcome of one gate evaluation. An empty breach list is a pass.
#[derive(Debug)]
pub struct GateDecision {
    /// Ordered breach descriptions; empty means promotion may proceed.
    pub breaches: Vec<String>,
    /// Run stats; `None` when preflight health failed and probing was
    /// skipped.
    pub stats: Option<CanaryRunStats>,
    /// The full attempt series (empty when probing was skipped).
    pub attempts: Vec<ProbeAttempt>,
}

impl GateDecision {
    pub fn passed(&self) -> bool {
        self.breaches.is_empty()
    }
}

/// Run the full canary evaluation.
pub async fn evaluate<I, H>(
    plan: &ProbePlan,
    thresholds: &GateThresholds,
    health: &H,
    invoker: &I,
    sink: Option<&dyn MetricsSink>,
) -> GateDecision
where
    I: Invoker,
    H: HealthProbe,
{
    let mut breaches = Vec::new();

    // Preflight: a target that is already unhealthy is not probed.
    let preflight = health.check().await;
    if !preflight.ok {
        let reason = preflight.reason.unwrap_or_else(|| "unknown".to_string());
        warn!(%reason, "preflight health check failed, skipping probe window");
        breaches.push(format!("health:{reason}"));
        return GateDecision {
            breaches,
            stats: None,
            attempts: Vec::new(),
        };
    }

    let (attempts, stats) = run_probes(plan, invoker, sink).await;

    if attempts.is_empty() {
        breaches.push("no_samples_collected".to_string());
    }

    if let Some(fatal) = &stats.fatal_error {
        breaches.push(format!("fatal:{fatal}"));
    }

    if stats.p95_latency_ms > thresholds.p95_threshold_ms {
        breaches.push(format!(
            "p95:{}>{}",
            stats.p95_latency_ms, thresholds.p95_threshold_ms
        ));
    }

    if stats.error_rate > thresholds.max_error_rate {
        breaches.push(format!(
            "errorRate:{}>{}",
            stats.error_rate, thresholds.max_error_rate
        ));
    }

    // Postflight only on a clean window: did the canary load itself
    // degrade the target?
    if breaches.is_empty() {
        let postflight = health.check().await;
        if !postflight.ok {
            let reason = postflight.reason.unwrap_or_else(|| "unknown".to_string());
            warn!(%reason, "postflight health check failed after a clean window");
            breaches.push(format!("health:{reason}"));
        }
    }

    if breaches.is_empty() {
        info!(session_id = %stats.session_id, "canary gate passed");
    } else {
        warn!(?breaches, "canary gate breached");
    }

    GateDecision {
        breaches,
        stats: Some(stats),
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthReading;
    use crate::invoker::{InvokeOptions, InvokeOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeInvoker {
        ok: bool,
        ms: f64,
        error: Option<String>,
    }

    impl Invoker for FakeInvoker {
        async fn invoke(
            &self,
            _target: &str,
            _capability: &str,
            _payload: &serde_json::Value,
            _opts: &InvokeOptions,
        ) -> InvokeOutcome {
            InvokeOutcome {
                ok: self.ok,
                duration_ms: Some(self.ms),
                error: self.error.clone(),
            }
        }
    }

    /// Health probe with scripted readings per call.
    struct FakeHealth {
        readings: Vec<HealthReading>,
        calls: AtomicUsize,
    }

    impl FakeHealth {
        fn always_ok() -> Self {
            Self {
                readings: vec![HealthReading {
                    ok: true,
                    reason: None,
                }],
                calls: AtomicUsize::new(0),
            }
        }

        fn scripted(readings: Vec<HealthReading>) -> Self {
            Self {
                readings,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl HealthProbe for FakeHealth {
        async fn check(&self) -> HealthReading {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.readings
                .get(i)
                .or_else(|| self.readings.last())
                .cloned()
                .unwrap_or(HealthReading {
                    ok: true,
                    reason: None,
                })
        }
    }

    fn plan() -> ProbePlan {
        ProbePlan {
            target: "svc:8080".to_string(),
            capability: "probe".to_string(),
            duration_secs: 1,
            qps: 1.0,
            timeout_ms: 2000,
            correlation_id: "rel-1".to_string(),
        }
    }

    fn thresholds() -> GateThresholds {
        GateThresholds {
            p95_threshold_ms: 400.0,
            max_error_rate: 0.05,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn clean_run_passes() {
        let invoker = FakeInvoker {
            ok: true,
            ms: 120.0,
            error: None,
        };
        let health = FakeHealth::always_ok();
        let decision = evaluate(&plan(), &thresholds(), &health, &invoker, None).await;

        assert!(decision.passed());
        let stats = decision.stats.unwrap();
        assert_eq!(stats.p95_latency_ms, 120.0);
        assert_eq!(stats.error_rate, 0.0);
        // Preflight and postflight both ran.
        assert_eq!(health.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unhealthy_preflight_skips_probing() {
        let invoker = FakeInvoker {
            ok: true,
            ms: 1.0,
            error: None,
        };
        let health = FakeHealth::scripted(vec![HealthReading {
            ok: false,
            reason: Some("HTTP 503".to_string()),
        }]);
        let decision = evaluate(&plan(), &thresholds(), &health, &invoker, None).await;

        assert_eq!(decision.breaches, vec!["health:HTTP 503".to_string()]);
        assert!(decision.stats.is_none());
        assert!(decision.attempts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_breaches_and_stops() {
        let invoker = FakeInvoker {
            ok: false,
            ms: 5.0,
            error: Some("circuit_open".to_string()),
        };
        let health = FakeHealth::always_ok();
        let decision = evaluate(&plan(), &thresholds(), &health, &invoker, None).await;

        assert!(!decision.passed());
        assert_eq!(decision.attempts.len(), 1);
        assert!(
            decision
                .breaches
                .contains(&"fatal:circuit_open".to_string())
        );
        // Fatal run also breaches the error rate; breaches accumulate.
        assert!(decision.breaches.len() >= 2);
        assert_eq!(decision.breaches[0], "fatal:circuit_open");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_target_breaches_p95() {
        let invoker = FakeInvoker {
            ok: true,
            ms: 500.0,
            error: None,
        };
        let health = FakeHealth::always_ok();
        let decision = evaluate(&plan(), &thresholds(), &health, &invoker, None).await;

        assert_eq!(decision.breaches, vec!["p95:500>400".to_string()]);
        // No postflight on a breached window.
        assert_eq!(health.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flaky_target_breaches_error_rate() {
        let invoker = FakeInvoker {
            ok: false,
            ms: 10.0,
            error: Some("HTTP 500".to_string()),
        };
        let health = FakeHealth::always_ok();
        let decision = evaluate(&plan(), &thresholds(), &health, &invoker, None).await;

        assert_eq!(decision.breaches, vec!["errorRate:1>0.05".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn postflight_degradation_breaches_a_clean_window() {
        let invoker = FakeInvoker {
            ok: true,
            ms: 50.0,
            error: None,
        };
        let health = FakeHealth::scripted(vec![
            HealthReading {
                ok: true,
                reason: None,
            },
            HealthReading {
                ok: false,
                reason: Some("status=degraded".to_string()),
            },
        ]);
        let decision = evaluate(&plan(), &thresholds(), &health, &invoker, None).await;

        assert_eq!(decision.breaches, vec!["health:status=degraded".to_string()]);
        // Stats exist: probing did run.
        assert!(decision.stats.is_some());
    }
}
