//! Backup orchestrator - runs the per-database pipeline for every target

use crate::artifact::sanitize_segment;
use crate::config::{Config, DatabaseTarget, ResolvedTarget, ToolPaths};
use crate::context::RunContext;
use crate::error::{BackupError, RunError};
use crate::report::{audit, Outcome, ReportEntry, RunReport};
use crate::retention::select_for_deletion;
use crate::storage::DestinationStore;
use crate::strategies::{self, Strategy};
use crate::utils::executor::DumpExecutor;
use crate::utils::hasher::digest_file;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// What a target's pipeline has produced so far
///
/// Kept outside the pipeline future so that partial results survive a
/// failure in a later stage.
#[derive(Debug, Default)]
struct TargetProgress {
    digest: Option<String>,
    destination_key: Option<String>,
    size_bytes: Option<u64>,
    pruned: Vec<String>,
}

pub struct BackupOrchestrator {
    executor: Arc<dyn DumpExecutor>,
    tools: ToolPaths,
    parallelism: usize,
    dump_timeout: Duration,
}

impl BackupOrchestrator {
    pub fn new(executor: Arc<dyn DumpExecutor>) -> Self {
        Self {
            executor,
            tools: ToolPaths::default(),
            parallelism: 1,
            dump_timeout: Duration::from_secs(3600),
        }
    }

    /// Create an orchestrator using the tool paths and limits from a config
    pub fn from_config(config: &Config, executor: Arc<dyn DumpExecutor>) -> Self {
        Self::new(executor)
            .with_tools(config.tools.clone())
            .with_parallelism(config.general.parallelism)
            .with_dump_timeout(Duration::from_secs(config.general.dump_timeout_seconds))
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_dump_timeout(mut self, timeout: Duration) -> Self {
        self.dump_timeout = timeout;
        self
    }

    /// Back up every target and enforce retention
    ///
    /// Per-target failures are recorded in the report; the only error is an
    /// empty target list. Entries come back in target order whatever order
    /// the targets finish in.
    pub async fn run(
        &self,
        targets: &[ResolvedTarget],
        destination: &dyn DestinationStore,
        retention_days: u32,
        ctx: &RunContext,
    ) -> Result<RunReport, RunError> {
        if targets.is_empty() {
            return Err(RunError::NoTargets);
        }

        let start_time = Instant::now();
        info!(
            "Starting backup of {} databases to {} (parallelism {}, retention {} days)",
            targets.len(),
            destination.describe(),
            self.parallelism,
            retention_days
        );

        let entries: Vec<ReportEntry> = stream::iter(targets)
            .map(|target| self.process_target(target, destination, retention_days, ctx))
            .buffered(self.parallelism)
            .collect()
            .await;

        let mut report = RunReport::new();
        for entry in entries {
            report.record(entry);
        }

        info!(
            "Backup run {} in {:.2}s",
            report.summary(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(report)
    }

    /// Run one target's pipeline and turn the result into a report entry
    async fn process_target(
        &self,
        resolved: &ResolvedTarget,
        destination: &dyn DestinationStore,
        retention_days: u32,
        ctx: &RunContext,
    ) -> ReportEntry {
        let span = info_span!(parent: &ctx.span, "target", database = %resolved.name);

        async move {
            let start_time = Instant::now();
            let mut progress = TargetProgress::default();

            let result = if ctx.cancel.is_cancelled() {
                Err(BackupError::Cancelled)
            } else {
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => Err(BackupError::Cancelled),
                    result = self.backup_target(resolved, destination, retention_days, ctx, &mut progress) => result,
                }
            };

            let outcome = match result {
                Ok(()) => {
                    info!("Backed up '{}'", resolved.name);
                    Outcome::Success
                }
                Err(e) => {
                    error!("Backup of '{}' failed: {}", resolved.name, e);
                    Outcome::Failed(e)
                }
            };

            let entry = ReportEntry {
                database_name: resolved.name.clone(),
                outcome,
                digest: progress.digest,
                destination_key: progress.destination_key,
                size_bytes: progress.size_bytes,
                pruned: progress.pruned,
                duration: start_time.elapsed(),
            };
            audit(&entry);
            entry
        }
        .instrument(span)
        .await
    }

    /// dump -> hash -> store -> verify -> prune
    async fn backup_target(
        &self,
        resolved: &ResolvedTarget,
        destination: &dyn DestinationStore,
        retention_days: u32,
        ctx: &RunContext,
        progress: &mut TargetProgress,
    ) -> Result<(), BackupError> {
        let target = resolved
            .target
            .as_ref()
            .map_err(|reason| BackupError::ConfigInvalid(reason.clone()))?;
        let strategy = Strategy::for_engine(target.engine);

        let scratch = scratch_dir(ctx, target).await?;

        let mut artifact = strategies::dump(
            &strategy,
            target,
            &self.tools,
            self.executor.as_ref(),
            scratch.path(),
            self.dump_timeout,
            ctx,
        )
        .await?;

        let digest = digest_file(&artifact.local_path).await.map_err(|e| {
            BackupError::StorageFailed(format!(
                "failed to hash {}: {}",
                artifact.local_path.display(),
                e
            ))
        })?;
        debug!("Digest of {}: {}", artifact.filename(), digest);
        artifact.digest = Some(digest.clone());
        progress.digest = Some(digest.clone());
        progress.size_bytes = Some(artifact.size_bytes);

        let key = destination.store(&artifact).await?;
        artifact.destination_key = Some(key.clone());
        progress.destination_key = Some(key.clone());

        destination.verify(&key, &digest).await?;

        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch directory for '{}': {}", target.name, e);
        }

        self.prune(target, destination, retention_days, ctx, progress)
            .await
    }

    /// Delete this database's expired artifacts
    ///
    /// Every expired artifact is attempted even if an earlier delete fails.
    async fn prune(
        &self,
        target: &DatabaseTarget,
        destination: &dyn DestinationStore,
        retention_days: u32,
        ctx: &RunContext,
        progress: &mut TargetProgress,
    ) -> Result<(), BackupError> {
        let existing = destination
            .list(&target.host, &target.name)
            .await
            .map_err(|e| BackupError::RetentionFailed(format!("listing artifacts failed: {}", e)))?;

        let expired = select_for_deletion(&existing, retention_days, ctx.clock.now());
        if expired.is_empty() {
            debug!("No expired artifacts for '{}'", target.name);
            return Ok(());
        }

        info!(
            "Pruning {} of {} artifacts for '{}'",
            expired.len(),
            existing.len(),
            target.name
        );

        let mut failures = Vec::new();
        for key in expired {
            match destination.delete(&key).await {
                Ok(()) => progress.pruned.push(key),
                Err(e) => {
                    warn!("Failed to delete expired artifact {}: {}", key, e);
                    failures.push(format!("{}: {}", key, e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(BackupError::RetentionFailed(failures.join("; ")));
        }

        Ok(())
    }
}

/// Private scratch directory for one target, removed when dropped
async fn scratch_dir(ctx: &RunContext, target: &DatabaseTarget) -> Result<TempDir, BackupError> {
    let scratch_error = |e: std::io::Error| {
        BackupError::StorageFailed(format!(
            "cannot create scratch directory in {}: {}",
            ctx.temp_dir.display(),
            e
        ))
    };

    tokio::fs::create_dir_all(&ctx.temp_dir)
        .await
        .map_err(scratch_error)?;

    tempfile::Builder::new()
        .prefix(&format!("{}-", sanitize_segment(&target.name)))
        .tempdir_in(&ctx.temp_dir)
        .map_err(scratch_error)
}
