//! Command implementations shared by the binary and the integration tests

use crate::config::{
    self, resolve_all_targets, resolve_destination, resolve_temp_dir, Config, ValidationReport,
};
use crate::context::RunContext;
use crate::managers::backup::BackupOrchestrator;
use crate::report::RunReport;
use crate::storage::{Destination, UploadObserver};
use crate::utils::executor::DumpExecutor;
use crate::utils::locker::RunLock;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info_span;

/// Exit code when every database was backed up
pub const EXIT_OK: u8 = 0;
/// Exit code when the run could not start
pub const EXIT_FATAL: u8 = 1;
/// Exit code when the run completed with at least one failed database
pub const EXIT_PARTIAL: u8 = 2;

/// Collaborators a backup run is wired with
pub struct BackupDeps {
    pub executor: Arc<dyn DumpExecutor>,
    pub observer: Option<Arc<dyn UploadObserver>>,
    pub cancel: CancellationToken,
}

/// Run a backup of every configured database
///
/// Holds the configuration's run lock for the whole run. Per-database
/// failures end up in the returned report.
pub async fn backup(
    config: &Config,
    config_path: &Path,
    report_path: Option<&Path>,
    deps: BackupDeps,
) -> Result<RunReport> {
    let temp_dir = resolve_temp_dir(config);
    let mut lock = RunLock::open(&temp_dir, config_path)?;
    let _guard = lock.try_acquire()?;

    let destination_config = resolve_destination(config)?;
    let destination = Destination::from_config(&destination_config, deps.observer)
        .context("Failed to set up backup destination")?;

    let targets = resolve_all_targets(config);
    let span = info_span!("run", config = %config_path.display());
    let ctx = RunContext::new(temp_dir)
        .with_span(span)
        .with_cancel(deps.cancel);

    let report = BackupOrchestrator::from_config(config, deps.executor)
        .run(&targets, &destination, config.general.retention_days, &ctx)
        .await?;

    if let Some(path) = report_path {
        write_report(&report, path)?;
    }

    Ok(report)
}

/// Write the report as pretty JSON
pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory: {:?}", parent))?;
    }
    let json = report.to_json().context("Failed to serialize run report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write report: {:?}", path))?;
    Ok(())
}

pub fn exit_code(report: &RunReport) -> u8 {
    if report.is_success() {
        EXIT_OK
    } else {
        EXIT_PARTIAL
    }
}

/// Check a configuration without dumping anything or touching the destination
pub fn validate(config_path: &Path) -> Result<ValidationReport> {
    config::validate(config_path)
        .with_context(|| format!("Invalid configuration: {}", config_path.display()))
}

/// Human-readable validation output, one line per database
pub fn render_validation(report: &ValidationReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Destination: {} (OK)", report.destination);
    let _ = writeln!(out, "Retention: {} days", report.retention_days);
    let _ = writeln!(out, "Databases:");

    for resolved in &report.targets {
        match &resolved.target {
            Ok(target) => {
                let _ = writeln!(
                    out,
                    "  {}: OK ({} on {}:{})",
                    resolved.name, target.engine, target.host, target.port
                );
            }
            Err(reason) => {
                let _ = writeln!(out, "  {}: ConfigInvalid: {}", resolved.name, reason);
            }
        }
    }

    if report.is_valid() {
        let _ = writeln!(out, "Configuration is valid!");
    } else {
        let _ = writeln!(out, "{} invalid database(s)", report.invalid_count());
    }

    out
}
