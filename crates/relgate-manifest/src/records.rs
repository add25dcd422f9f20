//! Typed records written into the manifest-extension document.
//!
//! Field names are camelCase on the wire: the manifest file is read by
//! non-Rust pipeline tooling (viewers, CI exporters).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One rollback entry in the append-only audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// RFC 3339 timestamp of the rollback decision.
    pub ts: String,
    /// Always `"rollback"`.
    pub action: String,
    pub correlation_id: String,
    pub reason: String,
    /// Who (or what automation) recorded the rollback.
    pub agent: String,
    /// Canary run stats, attached only when non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
}

/// The `annotations.canary` block written after a passing run.
/// Overwrites any prior value: successes only ever reflect the most
/// recent run, while failures accumulate in `audit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryAnnotation {
    /// Always `"canary-ok"`.
    pub status: String,
    pub ts: String,
    pub correlation_id: String,
    pub session_id: String,
    pub attempts: usize,
    pub successes: usize,
    pub failures: usize,
    pub p95: f64,
    pub error_rate: f64,
    pub duration_ms: u64,
}

/// Per-artifact verification result inside a promotion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    pub name: String,
    /// Unpadded base64url SHA-256 of the artifact content.
    pub sha256: String,
    pub key_id: String,
    pub algorithm: String,
}

/// Proof that one artifact was verified against one signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub name: String,
    pub key_id: String,
    pub algorithm: String,
    pub verified_at: String,
}

/// The top-level `promotion` block. Written atomically as a whole
/// after every artifact verifies, never partially.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRecord {
    /// Always `"verified"`.
    pub status: String,
    /// Distinct key ids that signed the verified artifacts.
    pub signers: Vec<String>,
    /// Distinct session identifiers from verified payloads.
    pub session_ids: Vec<String>,
    pub artifacts: Vec<ArtifactRecord>,
    pub attestations: Vec<Attestation>,
}
