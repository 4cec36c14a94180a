//! Database dump strategies
//!
//! Each engine knows how to describe its dump tool invocation. The shared
//! [`dump`] routine runs that invocation through a [`DumpExecutor`] and turns
//! the result into a [`BackupArtifact`].

pub mod mariadb;
pub mod mssql;
pub mod postgres;

use crate::artifact::BackupArtifact;
use crate::config::{DatabaseEngine, DatabaseTarget, ToolPaths};
use crate::context::RunContext;
use crate::utils::executor::{DumpCommand, DumpError, DumpExecutor};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub use mariadb::MariaDbStrategy;
pub use mssql::MssqlStrategy;
pub use postgres::PostgresStrategy;

/// Trait for dump strategies
pub trait DumpStrategy {
    fn engine(&self) -> DatabaseEngine;

    /// Build the tool invocation for a target. Credentials go in `env`, never in `args`.
    fn command(&self, target: &DatabaseTarget, tools: &ToolPaths) -> DumpCommand;
}

/// Closed set of supported engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    MariaDb(MariaDbStrategy),
    PostgreSql(PostgresStrategy),
    Mssql(MssqlStrategy),
}

impl Strategy {
    pub fn for_engine(engine: DatabaseEngine) -> Self {
        match engine {
            DatabaseEngine::MariaDb => Strategy::MariaDb(MariaDbStrategy),
            DatabaseEngine::PostgreSql => Strategy::PostgreSql(PostgresStrategy),
            DatabaseEngine::Mssql => Strategy::Mssql(MssqlStrategy),
        }
    }
}

impl DumpStrategy for Strategy {
    fn engine(&self) -> DatabaseEngine {
        match self {
            Strategy::MariaDb(s) => s.engine(),
            Strategy::PostgreSql(s) => s.engine(),
            Strategy::Mssql(s) => s.engine(),
        }
    }

    fn command(&self, target: &DatabaseTarget, tools: &ToolPaths) -> DumpCommand {
        match self {
            Strategy::MariaDb(s) => s.command(target, tools),
            Strategy::PostgreSql(s) => s.command(target, tools),
            Strategy::Mssql(s) => s.command(target, tools),
        }
    }
}

/// Dump one database into `work_dir`
///
/// The artifact is named after the clock's current time. A tool that exits
/// cleanly without writing anything to stdout is treated as a failure.
pub async fn dump(
    strategy: &impl DumpStrategy,
    target: &DatabaseTarget,
    tools: &ToolPaths,
    executor: &dyn DumpExecutor,
    work_dir: &Path,
    timeout: Duration,
    ctx: &RunContext,
) -> Result<BackupArtifact, DumpError> {
    let command = strategy.command(target, tools);

    let mut artifact = BackupArtifact {
        database_name: target.name.clone(),
        engine: strategy.engine(),
        host: target.host.clone(),
        created_at: ctx.clock.now(),
        local_path: work_dir.to_path_buf(),
        size_bytes: 0,
        digest: None,
        destination_key: None,
    };
    artifact.local_path = work_dir.join(artifact.filename());

    info!(
        "Dumping {} database '{}' on {}:{}",
        artifact.engine, target.name, target.host, target.port
    );

    let output = executor.run(&command, &artifact.local_path, timeout).await?;

    if output.raw_bytes == 0 {
        return Err(DumpError::EmptyOutput);
    }

    artifact.size_bytes = output.compressed_bytes;
    debug!(
        "Dump of '{}' finished: {} bytes raw, {} bytes compressed",
        target.name, output.raw_bytes, output.compressed_bytes
    );

    Ok(artifact)
}

/// Append user-supplied flags after the strategy's own
pub(crate) fn with_extra_params(mut args: Vec<String>, target: &DatabaseTarget) -> Vec<String> {
    args.extend(target.extra_params.iter().cloned());
    args
}
