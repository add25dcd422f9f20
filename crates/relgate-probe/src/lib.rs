//! relgate-probe — the canary probe pipeline.
//!
//! A canary run is a single cooperative sequential loop: no parallel
//! fan-out, so observed latency is real serial latency, and the loop
//! can stop on the first fatal signal without wasted in-flight calls.
//!
//! # Architecture
//!
//! ```text
//! evaluate()
//!   ├── HealthProbe::check() (preflight)
//!   ├── run_probes()
//!   │   ├── Invoker::invoke() per paced attempt
//!   │   ├── fatal-pattern check, early stop
//!   │   └── MetricsSink::log() (best-effort)
//!   ├── thresholds (p95, error rate)
//!   └── HealthProbe::check() (postflight, only on a clean run)
//! ```
//!
//! Network failures are never errors here: they become failed attempts
//! or unhealthy readings and fold into the breach decision.

pub mod evaluator;
pub mod fatal;
pub mod health;
pub mod invoker;
pub mod scheduler;
pub mod sink;

pub use evaluator::{GateDecision, GateThresholds, evaluate};
pub use fatal::FatalPatterns;
pub use health::{HealthGate, HealthProbe, HealthReading};
pub use invoker::{HttpInvoker, InvokeOptions, InvokeOutcome, Invoker};
pub use scheduler::{CanaryRunStats, ProbeAttempt, ProbePlan, run_probes};
pub use sink::{JsonlSink, MetricsSink};
