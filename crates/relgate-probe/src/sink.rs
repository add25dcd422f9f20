//! Metrics sink — best-effort telemetry.
//!
//! The scheduler fires one event per attempt and swallows sink errors;
//! telemetry never affects the gate decision.

use std::io::Write;
use std::path::{Path, PathBuf};

use relgate_stats::TelemetryEvent;

/// Telemetry collaborator. Returns the path the event landed in so
/// callers can report where telemetry went.
pub trait MetricsSink {
    fn log(&self, event: &TelemetryEvent) -> std::io::Result<PathBuf>;
}

/// Appends one JSON line per event to a file, creating it (and parent
/// directories) on first write.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for JsonlSink {
    fn log(&self, event: &TelemetryEvent) -> std::io::Result<PathBuf> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(self.path.clone())
    }
}
