//! Per-database failure taxonomy
//!
//! Every failure that happens while backing up one database ends up as a
//! [`BackupError`] in that database's report entry. Only [`RunError`] ever
//! escapes a run.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BackupError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("dump failed{}: {stderr_excerpt}", exit_suffix(.exit_code))]
    DumpFailed {
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },

    #[error("storage failed: {0}")]
    StorageFailed(String),

    #[error("retention failed: {0}")]
    RetentionFailed(String),

    #[error("cancelled before completion")]
    Cancelled,
}

impl BackupError {
    /// Short machine-readable name, used in audit records
    pub fn kind(&self) -> &'static str {
        match self {
            BackupError::ConfigInvalid(_) => "config_invalid",
            BackupError::DumpFailed { .. } => "dump_failed",
            BackupError::StorageFailed(_) => "storage_failed",
            BackupError::RetentionFailed(_) => "retention_failed",
            BackupError::Cancelled => "cancelled",
        }
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {})", c)).unwrap_or_default()
}

/// Failures that prevent a run from starting at all
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("no databases to back up")]
    NoTargets,
}
