//! Run reports and the audit trail
//!
//! A [`RunReport`] holds one entry per configured database, in configuration
//! order. Entries are only ever appended.

use crate::error::BackupError;
use serde::{Serialize, Serializer};
use std::time::Duration;
use tracing::{error, info};

/// Outcome of backing up one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed(BackupError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn error(&self) -> Option<&BackupError> {
        match self {
            Outcome::Success => None,
            Outcome::Failed(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub database_name: String,
    pub outcome: Outcome,
    pub digest: Option<String>,
    pub destination_key: Option<String>,
    pub size_bytes: Option<u64>,
    /// Keys removed by retention during this run
    pub pruned: Vec<String>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl ReportEntry {
    pub fn failed(database_name: impl Into<String>, error: BackupError, duration: Duration) -> Self {
        Self {
            database_name: database_name.into(),
            outcome: Outcome::Failed(error),
            digest: None,
            destination_key: None,
            size_bytes: None,
            pruned: Vec::new(),
            duration,
        }
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Ordered per-database outcomes of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn entry(&self, database_name: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.database_name == database_name)
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.len() - self.success_count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// One-line summary for the end of a run
    pub fn summary(&self) -> String {
        match self.failure_count() {
            0 => format!("completed: {} databases backed up", self.entries.len()),
            n => format!("completed with {} failures", n),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Emit the audit record for one finished target
pub fn audit(entry: &ReportEntry) {
    let duration_ms = entry.duration.as_millis() as u64;
    let pruned = entry.pruned.join(",");
    let digest = entry.digest.as_deref().unwrap_or("");
    let destination_key = entry.destination_key.as_deref().unwrap_or("");
    let size_bytes = entry.size_bytes.unwrap_or(0);

    match &entry.outcome {
        Outcome::Success => info!(
            target: "safedb::audit",
            database = %entry.database_name,
            outcome = "success",
            error_kind = "",
            digest,
            destination_key,
            size_bytes,
            duration_ms,
            pruned = %pruned,
            "backup succeeded"
        ),
        Outcome::Failed(err) => error!(
            target: "safedb::audit",
            database = %entry.database_name,
            outcome = "failed",
            error_kind = err.kind(),
            digest,
            destination_key,
            size_bytes,
            duration_ms,
            pruned = %pruned,
            error = %err,
            "backup failed"
        ),
    }
}
