//! relgate-verify — the promotion verification pipeline.
//!
//! Promotion of a release requires every signed artifact under the
//! artifact root to verify: allowed algorithm, required payload
//! fields, a content digest that matches the payload, and a valid
//! ed25519 signature. Verification never fails fast — every artifact
//! is checked and every divergence reported — and the manifest is
//! mutated only on full success, never partially.

pub mod canonical;
pub mod envelope;
pub mod verifier;

pub use canonical::canonical_json;
pub use envelope::{EnvelopeHeader, SignatureEnvelope};
pub use verifier::{PromotionVerifier, VerifyOptions, sha256_base64url};

use thiserror::Error;

/// Result type alias for verification operations.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Errors from the promotion pipeline.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Bad inputs (key material, artifact root). Fail fast, no side
    /// effects.
    #[error("configuration error: {0}")]
    Config(String),

    /// Aggregated per-artifact verification failures. The manifest is
    /// untouched when this is returned.
    #[error("verification failed for {} artifact(s)", .0.len())]
    Failed(Vec<String>),

    /// Manifest persistence failure while writing the promotion record.
    #[error(transparent)]
    Manifest(#[from] relgate_manifest::ManifestError),
}
