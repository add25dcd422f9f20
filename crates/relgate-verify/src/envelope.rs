//! Signature sidecar envelopes.
//!
//! Each artifact `<name>` may carry a sibling `<name>.sig.json`:
//!
//! ```json
//! {
//!   "header": { "alg": "ed25519", "kid": "release-key-1" },
//!   "payload": { "sha256": "...", "sessionId": "...", ... },
//!   "signature": "<base64url, unpadded>"
//! }
//! ```
//!
//! The signature covers the SHA-256 digest of the canonical JSON of
//! `payload`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sidecar suffix appended to the artifact file name.
pub const SIDECAR_SUFFIX: &str = ".sig.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Signature algorithm, e.g. `ed25519`.
    pub alg: String,
    /// Key identifier of the signer.
    pub kid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    pub header: EnvelopeHeader,
    /// Signed claims. Must contain the configured required fields and
    /// a `sha256` binding the signature to the artifact content.
    pub payload: Map<String, Value>,
    /// Unpadded base64url signature bytes.
    pub signature: String,
}

impl SignatureEnvelope {
    /// Parse a sidecar file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("unreadable sidecar: {e}"))?;
        serde_json::from_str(&content).map_err(|e| format!("malformed sidecar: {e}"))
    }

    /// The digest claimed by the payload, if any.
    pub fn claimed_sha256(&self) -> Option<&str> {
        self.payload.get("sha256").and_then(Value::as_str)
    }

    /// The session identifier claimed by the payload, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.payload.get("sessionId").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.tar.gz.sig.json");
        std::fs::write(
            &path,
            r#"{
              "header": {"alg": "ed25519", "kid": "key-a"},
              "payload": {"sha256": "abc", "sessionId": "s1", "release": "1.2.0"},
              "signature": "c2ln"
            }"#,
        )
        .unwrap();

        let envelope = SignatureEnvelope::from_file(&path).unwrap();
        assert_eq!(envelope.header.alg, "ed25519");
        assert_eq!(envelope.header.kid, "key-a");
        assert_eq!(envelope.claimed_sha256(), Some("abc"));
        assert_eq!(envelope.session_id(), Some("s1"));
    }

    #[test]
    fn malformed_sidecar_is_a_readable_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sig.json");
        std::fs::write(&path, "{ nope").unwrap();

        let err = SignatureEnvelope::from_file(&path).unwrap_err();
        assert!(err.contains("malformed sidecar"));
    }
}
