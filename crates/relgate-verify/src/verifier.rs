//! The promotion verifier.
//!
//! Discovery walks the artifact root for files with a signature
//! sidecar. Each candidate goes through the same checks — algorithm,
//! required fields, digest binding, signature — with every failure
//! collected so a single report names every divergence. The promotion
//! record is written only when all artifacts verify.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use relgate_manifest::{
    ArtifactRecord, Attestation, ManifestStore, PromotionRecord, store::now_rfc3339,
};

use crate::canonical::canonical_json;
use crate::envelope::{SIDECAR_SUFFIX, SignatureEnvelope};
use crate::{VerifyError, VerifyResult};

/// Verification policy.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Algorithms accepted in `header.alg`.
    pub allowed_algorithms: Vec<String>,
    /// Names that must be present in every signed payload.
    pub required_fields: Vec<String>,
    /// When set, an artifact without a sidecar fails verification
    /// instead of being skipped.
    pub require_signatures: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            allowed_algorithms: vec!["ed25519".to_string()],
            required_fields: vec!["sha256".to_string(), "sessionId".to_string()],
            require_signatures: false,
        }
    }
}

/// Verifies release artifacts against one trusted public key.
pub struct PromotionVerifier {
    public_key: VerifyingKey,
    options: VerifyOptions,
}

impl PromotionVerifier {
    /// Build a verifier from a hex-encoded 32-byte ed25519 public key.
    /// Bad key material is a configuration error.
    pub fn new(public_key_hex: &str, options: VerifyOptions) -> VerifyResult<Self> {
        let key_bytes = hex::decode(public_key_hex.trim())
            .map_err(|e| VerifyError::Config(format!("invalid public key hex: {e}")))?;
        let key_arr: [u8; 32] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| VerifyError::Config("public key must be 32 bytes".to_string()))?;
        let public_key = VerifyingKey::from_bytes(&key_arr)
            .map_err(|e| VerifyError::Config(format!("invalid ed25519 public key: {e}")))?;

        Ok(Self {
            public_key,
            options,
        })
    }

    /// Verify every signed artifact under `artifact_root` and, on full
    /// success, write the promotion record through `store`. Any
    /// failure leaves the manifest untouched.
    pub fn verify_and_promote(
        &self,
        store: &ManifestStore,
        artifact_root: &Path,
    ) -> VerifyResult<PromotionRecord> {
        let candidates = discover_artifacts(artifact_root, store.path())?;

        let mut failures: Vec<String> = Vec::new();
        let mut artifacts: Vec<ArtifactRecord> = Vec::new();
        let mut attestations: Vec<Attestation> = Vec::new();
        let mut signers: BTreeSet<String> = BTreeSet::new();
        let mut session_ids: BTreeSet<String> = BTreeSet::new();

        for candidate in &candidates {
            let name = candidate.name.clone();
            let sidecar = match &candidate.sidecar {
                Some(Ok(sidecar)) => sidecar,
                Some(Err(problem)) => {
                    failures.push(format!("{name}: {problem}"));
                    continue;
                }
                None => {
                    if self.options.require_signatures {
                        failures.push(format!("{name}: unsigned artifact (no sidecar)"));
                    } else {
                        debug!(artifact = %name, "no signature sidecar, not gated");
                    }
                    continue;
                }
            };

            match self.verify_one(&candidate.path, sidecar) {
                Ok(verified) => {
                    signers.insert(verified.key_id.clone());
                    if let Some(session) = verified.session_id {
                        session_ids.insert(session);
                    }
                    attestations.push(Attestation {
                        name: name.clone(),
                        key_id: verified.key_id.clone(),
                        algorithm: verified.algorithm.clone(),
                        verified_at: now_rfc3339(),
                    });
                    artifacts.push(ArtifactRecord {
                        name,
                        sha256: verified.sha256,
                        key_id: verified.key_id,
                        algorithm: verified.algorithm,
                    });
                }
                Err(problems) => {
                    for problem in problems {
                        failures.push(format!("{name}: {problem}"));
                    }
                }
            }
        }

        if !failures.is_empty() {
            warn!(
                failures = failures.len(),
                "promotion blocked, manifest untouched"
            );
            return Err(VerifyError::Failed(failures));
        }

        let record = PromotionRecord {
            status: "verified".to_string(),
            signers: signers.into_iter().collect(),
            session_ids: session_ids.into_iter().collect(),
            artifacts,
            attestations,
        };
        store.write_promotion(&record)?;

        info!(
            artifacts = record.artifacts.len(),
            signers = record.signers.len(),
            "promotion verified"
        );
        Ok(record)
    }

    /// Run all checks for one artifact, collecting every problem.
    fn verify_one(
        &self,
        path: &Path,
        envelope: &SignatureEnvelope,
    ) -> Result<VerifiedArtifact, Vec<String>> {
        let mut problems = Vec::new();

        let alg = envelope.header.alg.as_str();
        if !self
            .options
            .allowed_algorithms
            .iter()
            .any(|allowed| allowed == alg)
        {
            problems.push(format!("disallowed algorithm '{alg}'"));
        } else if alg != "ed25519" {
            problems.push(format!("unsupported algorithm '{alg}'"));
        }

        for field in &self.options.required_fields {
            if !envelope.payload.contains_key(field) {
                problems.push(format!("missing required field '{field}'"));
            }
        }

        let computed = match std::fs::read(path) {
            Ok(bytes) => Some(sha256_base64url(&bytes)),
            Err(e) => {
                problems.push(format!("unreadable artifact: {e}"));
                None
            }
        };

        if let Some(computed) = &computed {
            match envelope.claimed_sha256() {
                Some(claimed) if claimed == computed => {}
                Some(claimed) => {
                    problems.push(format!(
                        "digest mismatch (payload {claimed}, computed {computed})"
                    ));
                }
                None => {
                    // Covered by required-field checks when sha256 is
                    // configured; still a binding failure without it.
                    problems.push("payload carries no sha256 digest".to_string());
                }
            }
        }

        if problems.is_empty() {
            if let Err(problem) = self.check_signature(envelope) {
                problems.push(problem);
            }
        }

        if !problems.is_empty() {
            return Err(problems);
        }

        Ok(VerifiedArtifact {
            sha256: computed.unwrap_or_default(),
            key_id: envelope.header.kid.clone(),
            algorithm: envelope.header.alg.clone(),
            session_id: envelope.session_id().map(str::to_string),
        })
    }

    /// Verify the ed25519 signature over the sha256 digest of the
    /// canonical payload JSON.
    fn check_signature(&self, envelope: &SignatureEnvelope) -> Result<(), String> {
        let sig_bytes = URL_SAFE_NO_PAD
            .decode(&envelope.signature)
            .map_err(|e| format!("undecodable signature: {e}"))?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|_| "invalid signature length".to_string())?;

        let payload_value = serde_json::Value::Object(envelope.payload.clone());
        let canonical = canonical_json(&payload_value)
            .map_err(|e| format!("payload canonicalization failed: {e}"))?;
        let digest = Sha256::digest(&canonical);

        self.public_key
            .verify_strict(digest.as_slice(), &signature)
            .map_err(|_| "signature verification failed".to_string())
    }
}

struct VerifiedArtifact {
    sha256: String,
    key_id: String,
    algorithm: String,
    session_id: Option<String>,
}

struct Candidate {
    /// Path relative to the artifact root, '/'-separated.
    name: String,
    path: PathBuf,
    /// Parse result of the sidecar, or `None` for unsigned artifacts.
    /// A present-but-broken sidecar gates the artifact, never the walk.
    sidecar: Option<Result<SignatureEnvelope, String>>,
}

/// Walk the artifact root. Sidecar files and the manifest itself are
/// never candidates.
fn discover_artifacts(root: &Path, manifest_path: &Path) -> VerifyResult<Vec<Candidate>> {
    if !root.is_dir() {
        return Err(VerifyError::Config(format!(
            "artifact root {} is not a directory",
            root.display()
        )));
    }
    let manifest_abs = std::fs::canonicalize(manifest_path).ok();

    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry =
            entry.map_err(|e| VerifyError::Config(format!("artifact walk failed: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.to_string_lossy().ends_with(SIDECAR_SUFFIX) {
            continue;
        }
        if let Some(manifest_abs) = &manifest_abs
            && std::fs::canonicalize(path).ok().as_deref() == Some(manifest_abs.as_path())
        {
            continue;
        }

        let name = path
            .strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let sidecar_path = sidecar_path_for(path);
        let sidecar = sidecar_path
            .is_file()
            .then(|| SignatureEnvelope::from_file(&sidecar_path));

        candidates.push(Candidate {
            name,
            path: path.to_path_buf(),
            sidecar,
        });
    }

    Ok(candidates)
}

fn sidecar_path_for(artifact: &Path) -> PathBuf {
    let mut file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name.push_str(SIDECAR_SUFFIX);
    artifact.with_file_name(file_name)
}

/// SHA-256 of `bytes`, unpadded base64url.
pub fn sha256_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(bytes))
}
