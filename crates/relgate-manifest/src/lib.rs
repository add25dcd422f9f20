//! relgate-manifest — the durable manifest-extension document.
//!
//! A release's manifest extension is a JSON side file holding two
//! always-present containers plus whatever other top-level blocks the
//! pipeline writes:
//!
//! ```text
//! {
//!   "annotations": { "canary": { ... } },   // last-writer-wins
//!   "audit": [ { "action": "rollback", ... } ],  // append-only
//!   "promotion": { "status": "verified", ... }   // replaced wholesale
//! }
//! ```
//!
//! The document is the only persisted state of the gate. Rollbacks
//! accumulate in `audit`; a passing canary overwrites
//! `annotations.canary`; a verified promotion replaces `promotion`.
//! There is no file locking — concurrent gate invocations against the
//! same path are an operational constraint on pipeline scheduling.

pub mod document;
pub mod records;
pub mod store;

pub use document::ManifestDocument;
pub use records::{ArtifactRecord, Attestation, AuditEntry, CanaryAnnotation, PromotionRecord};
pub use store::ManifestStore;

use thiserror::Error;

/// Result type alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors from manifest persistence. Read-modify-write failures are
/// always surfaced: the audit entry is the record of truth for a
/// failed release.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write manifest {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("manifest {path} is not valid JSON: {message}")]
    Parse { path: String, message: String },

    #[error("serialization error: {0}")]
    Serialize(String),
}
