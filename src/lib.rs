//! SafeDB Library
//!
//! Backs up MariaDB, PostgreSQL and SQL Server databases to a local directory
//! or an Azure Blob container, verifies every stored artifact against its
//! SHA-256 digest and prunes artifacts older than the retention horizon.

pub mod artifact;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod managers;
pub mod report;
pub mod retention;
pub mod storage;
pub mod strategies;
pub mod utils;

// Re-export commonly used types
pub use artifact::{BackupArtifact, StoredArtifactRef};
pub use config::{load_config, resolve_all_targets, Config, DatabaseTarget, ResolvedTarget};
pub use context::RunContext;
pub use error::{BackupError, RunError};
pub use managers::backup::BackupOrchestrator;
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use report::{Outcome, ReportEntry, RunReport};
pub use storage::{Destination, DestinationStore};
