//! `relgate promote` — verify signed artifacts and record promotion.

use std::path::PathBuf;
use std::process::ExitCode;

use relgate_manifest::ManifestStore;
use relgate_verify::{PromotionVerifier, VerifyError, VerifyOptions};

#[derive(clap::Args)]
pub struct PromoteArgs {
    /// Manifest extension file receiving the promotion record.
    #[arg(long, env = "RELGATE_MANIFEST", default_value = "release/manifest.ext.json")]
    pub manifest: PathBuf,

    /// Directory holding release artifacts and their `.sig.json`
    /// sidecars.
    #[arg(long, env = "RELGATE_ARTIFACT_ROOT", default_value = "dist")]
    pub artifact_root: PathBuf,

    /// Hex-encoded ed25519 public key trusted for this release.
    #[arg(long, env = "RELGATE_PUBLIC_KEY")]
    pub public_key: String,

    /// Signature algorithms accepted in sidecar headers (repeatable).
    #[arg(long = "allow-alg", default_values_t = vec!["ed25519".to_string()])]
    pub allowed_algorithms: Vec<String>,

    /// Payload fields every signed sidecar must carry (repeatable).
    #[arg(
        long = "require-field",
        default_values_t = vec!["sha256".to_string(), "sessionId".to_string()],
    )]
    pub required_fields: Vec<String>,

    /// Fail artifacts that have no signature sidecar instead of
    /// skipping them.
    #[arg(long)]
    pub require_signatures: bool,

    /// Also print a machine-readable JSON payload.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: PromoteArgs) -> anyhow::Result<ExitCode> {
    let options = VerifyOptions {
        allowed_algorithms: args.allowed_algorithms,
        required_fields: args.required_fields,
        require_signatures: args.require_signatures,
    };
    let verifier = PromotionVerifier::new(&args.public_key, options)?;
    let store = ManifestStore::new(&args.manifest);

    match verifier.verify_and_promote(&store, &args.artifact_root) {
        Ok(record) => {
            if args.json {
                println!("{}", serde_json::to_value(&record)?);
            }
            println!(
                "promotion verified: {} artifact(s), {} signer(s)",
                record.artifacts.len(),
                record.signers.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(VerifyError::Failed(failures)) => {
            for failure in &failures {
                eprintln!("verification failed: {failure}");
            }
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "blocked", "failures": failures })
                );
            }
            println!(
                "promotion blocked: {} failing artifact(s), manifest untouched",
                failures.len()
            );
            Ok(ExitCode::FAILURE)
        }
        // Configuration and persistence errors propagate as hard
        // failures.
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use ed25519_dalek::{Signer, SigningKey};
    use sha2::{Digest, Sha256};

    fn args(dir: &tempfile::TempDir, public_key: String) -> PromoteArgs {
        PromoteArgs {
            manifest: dir.path().join("manifest.ext.json"),
            artifact_root: dir.path().join("dist"),
            public_key,
            allowed_algorithms: vec!["ed25519".to_string()],
            required_fields: vec!["sha256".to_string(), "sessionId".to_string()],
            require_signatures: false,
            json: false,
        }
    }

    fn sign_artifact(root: &std::path::Path, name: &str, content: &[u8], key: &SigningKey) {
        std::fs::create_dir_all(root).unwrap();
        let path = root.join(name);
        std::fs::write(&path, content).unwrap();

        let payload = serde_json::json!({
            "sha256": URL_SAFE_NO_PAD.encode(Sha256::digest(content)),
            "sessionId": "s1",
        });
        let canonical = relgate_verify::canonical_json(&payload).unwrap();
        let signature = key.sign(Sha256::digest(&canonical).as_slice());
        let sidecar = serde_json::json!({
            "header": {"alg": "ed25519", "kid": "release-key"},
            "payload": payload,
            "signature": URL_SAFE_NO_PAD.encode(signature.to_bytes()),
        });
        std::fs::write(
            root.join(format!("{name}.sig.json")),
            serde_json::to_string(&sidecar).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn verified_promotion_lands_in_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let args = args(&dir, hex::encode(key.verifying_key().to_bytes()));
        sign_artifact(&args.artifact_root, "app.tar.gz", b"bytes", &key);

        let manifest = args.manifest.clone();
        run(args).unwrap();

        let doc = ManifestStore::new(&manifest).load().unwrap();
        let promotion = doc.promotion().unwrap();
        assert_eq!(promotion["status"], serde_json::json!("verified"));
        assert_eq!(promotion["signers"], serde_json::json!(["release-key"]));
    }

    #[test]
    fn tampered_artifact_blocks_without_manifest_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let args = args(&dir, hex::encode(key.verifying_key().to_bytes()));
        sign_artifact(&args.artifact_root, "app.tar.gz", b"bytes", &key);
        std::fs::write(args.artifact_root.join("app.tar.gz"), b"tampered").unwrap();

        let manifest = args.manifest.clone();
        run(args).unwrap();

        // Blocked promotion never creates the manifest.
        assert!(!manifest.exists());
    }

    #[test]
    fn bad_key_material_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(&dir, "not-hex".to_string());
        std::fs::create_dir_all(&args.artifact_root).unwrap();
        assert!(run(args).is_err());
    }
}
