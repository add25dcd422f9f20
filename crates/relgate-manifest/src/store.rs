//! ManifestStore — read-modify-write persistence for one manifest path.
//!
//! Writes are plain overwrites with stable pretty formatting and a
//! trailing newline. There is no temp-file swap and no lock: the store
//! assumes a single writer, scheduled externally.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::document::ManifestDocument;
use crate::records::{AuditEntry, CanaryAnnotation, PromotionRecord};
use crate::{ManifestError, ManifestResult};

/// Store bound to one manifest-extension file path.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. A missing file yields the default document;
    /// unreadable content and JSON parse errors propagate. The loaded
    /// value is always re-normalized.
    pub fn load(&self) -> ManifestResult<ManifestDocument> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "manifest absent, starting from default");
                return Ok(ManifestDocument::default());
            }
            Err(source) => {
                return Err(ManifestError::Read {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };

        let value: Value =
            serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(ManifestDocument::from_value(value))
    }

    /// Write the document: normalize, create parent directories,
    /// pretty-print with a trailing newline, overwrite in place.
    pub fn write(&self, doc: &ManifestDocument) -> ManifestResult<()> {
        let mut doc = doc.clone();
        doc.normalize();

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| ManifestError::Write {
                path: self.path.display().to_string(),
                source,
            })?;
        }

        let mut serialized = serde_json::to_string_pretty(&doc.to_value())
            .map_err(|e| ManifestError::Serialize(e.to_string()))?;
        serialized.push('\n');

        std::fs::write(&self.path, serialized).map_err(|source| ManifestError::Write {
            path: self.path.display().to_string(),
            source,
        })?;

        debug!(path = %self.path.display(), "manifest written");
        Ok(())
    }

    /// Append exactly one rollback entry to the audit history and
    /// persist. `stats` is attached only when it is a non-empty object.
    pub fn record_rollback(
        &self,
        correlation_id: &str,
        reason: &str,
        agent: &str,
        stats: Option<Value>,
    ) -> ManifestResult<AuditEntry> {
        let stats = stats.filter(|s| s.as_object().is_some_and(|m| !m.is_empty()));
        let entry = AuditEntry {
            ts: now_rfc3339(),
            action: "rollback".to_string(),
            correlation_id: correlation_id.to_string(),
            reason: reason.to_string(),
            agent: agent.to_string(),
            stats,
        };

        let mut doc = self.load()?;
        let entry_value = serde_json::to_value(&entry)
            .map_err(|e| ManifestError::Serialize(e.to_string()))?;
        doc.push_audit(entry_value);
        self.write(&doc)?;

        info!(
            correlation_id,
            reason,
            agent,
            audit_len = doc.audit().len(),
            "rollback recorded"
        );
        Ok(entry)
    }

    /// Overwrite `annotations.canary` with the latest passing run.
    pub fn annotate_success(&self, annotation: &CanaryAnnotation) -> ManifestResult<()> {
        let mut doc = self.load()?;
        let value = serde_json::to_value(annotation)
            .map_err(|e| ManifestError::Serialize(e.to_string()))?;
        doc.set_annotation("canary", value);
        self.write(&doc)?;

        info!(
            correlation_id = %annotation.correlation_id,
            session_id = %annotation.session_id,
            "canary success annotated"
        );
        Ok(())
    }

    /// Replace the `promotion` block wholesale and persist.
    pub fn write_promotion(&self, record: &PromotionRecord) -> ManifestResult<()> {
        let mut doc = self.load()?;
        let value = serde_json::to_value(record)
            .map_err(|e| ManifestError::Serialize(e.to_string()))?;
        doc.set_promotion(value);
        self.write(&doc)?;

        info!(
            artifacts = record.artifacts.len(),
            signers = record.signers.len(),
            "promotion recorded"
        );
        Ok(())
    }
}

/// Current UTC time, RFC 3339 with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
