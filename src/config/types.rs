use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub general: GeneralConfig,

    /// Engine-level defaults
    #[serde(default)]
    pub mariadb: Option<EngineDefaults>,
    #[serde(default)]
    pub postgresql: Option<EngineDefaults>,
    #[serde(default)]
    pub mssql: Option<EngineDefaults>,

    /// Per-database overrides, keyed by database name
    #[serde(default)]
    pub databases: HashMap<String, DatabaseOverride>,

    #[serde(default)]
    pub tools: ToolPaths,

    #[serde(default)]
    pub local: Option<LocalConfig>,
    #[serde(default)]
    pub cloud_blob: Option<CloudBlobConfig>,
}

/// Global settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Databases to back up, in run order
    #[serde(default)]
    pub databases: Vec<String>,

    /// Where artifacts are stored
    pub destination: DestinationKind,

    /// Age in days beyond which artifacts are pruned
    pub retention_days: u32,

    /// Engine used by databases that don't declare a `type`
    #[serde(default)]
    pub default_db_type: Option<String>,

    /// Maximum number of databases processed at the same time
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    #[serde(default = "default_dump_timeout")]
    pub dump_timeout_seconds: u64,

    /// Scratch directory for in-flight dumps (defaults to the system temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    #[serde(alias = "Local")]
    Local,
    #[serde(alias = "AzureBlob", alias = "azure_blob")]
    CloudBlob,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationKind::Local => write!(f, "local"),
            DestinationKind::CloudBlob => write!(f, "cloud_blob"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Connection settings shared by every database of one engine
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct EngineDefaults {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub extra_params: Vec<String>,
}

/// Settings for a single database (raw, before merging with engine defaults)
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct DatabaseOverride {
    /// Engine name; kept as a string so an unknown value only invalidates this database
    #[serde(default, rename = "type")]
    pub db_type: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Replaces the engine's extra_params when present
    #[serde(default)]
    pub extra_params: Option<Vec<String>>,
}

// Credentials stay out of debug output.
impl fmt::Debug for EngineDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineDefaults")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("extra_params", &self.extra_params)
            .finish()
    }
}

impl fmt::Debug for DatabaseOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseOverride")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("extra_params", &self.extra_params)
            .finish()
    }
}

/// External dump programs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolPaths {
    #[serde(default = "default_mariadb_dump")]
    pub mariadb_dump: String,
    #[serde(default = "default_pg_dump")]
    pub pg_dump: String,
    #[serde(default = "default_mssql_scripter")]
    pub mssql_scripter: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            mariadb_dump: default_mariadb_dump(),
            pg_dump: default_pg_dump(),
            mssql_scripter: default_mssql_scripter(),
        }
    }
}

/// Local filesystem destination
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub backup_path: Option<PathBuf>,
}

/// Azure Blob Storage destination
#[derive(Clone, Deserialize, Serialize)]
pub struct CloudBlobConfig {
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_timeout")]
    pub retry_timeout_seconds: u64,
    /// Re-read uploaded blobs and compare digests
    #[serde(default = "default_verify_uploads")]
    pub verify_uploads: bool,
}

impl fmt::Debug for CloudBlobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudBlobConfig")
            .field("connection_string", &self.connection_string.as_ref().map(|_| "***"))
            .field("container_name", &self.container_name)
            .field("max_retries", &self.max_retries)
            .field("retry_timeout_seconds", &self.retry_timeout_seconds)
            .field("verify_uploads", &self.verify_uploads)
            .finish()
    }
}

/// Resolved destination settings
#[derive(Debug, Clone)]
pub enum DestinationConfig {
    Local {
        backup_path: PathBuf,
    },
    CloudBlob(CloudBlobSettings),
}

#[derive(Clone)]
pub struct CloudBlobSettings {
    pub connection: super::connection::AzureConnection,
    pub container_name: String,
    pub max_retries: usize,
    pub retry_timeout_seconds: u64,
    pub verify_uploads: bool,
}

impl fmt::Debug for CloudBlobSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudBlobSettings")
            .field("account", &self.connection.account)
            .field("container_name", &self.container_name)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

// Default value functions

fn default_parallelism() -> usize { 1 }
fn default_dump_timeout() -> u64 { 3600 }
fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_mariadb_dump() -> String { "mariadb-dump".to_string() }
fn default_pg_dump() -> String { "pg_dump".to_string() }
fn default_mssql_scripter() -> String { "mssql-scripter".to_string() }
fn default_max_retries() -> usize { 3 }
fn default_retry_timeout() -> u64 { 180 }
fn default_verify_uploads() -> bool { true }
