//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.

use safedb::config::{
    CloudBlobConfig, Config, DatabaseEngine, DatabaseOverride, DestinationKind, EngineDefaults,
    GeneralConfig, LocalConfig, LogFormat, ToolPaths,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    general: GeneralConfig,
    mariadb: Option<EngineDefaults>,
    postgresql: Option<EngineDefaults>,
    mssql: Option<EngineDefaults>,
    databases: HashMap<String, DatabaseOverride>,
    tools: ToolPaths,
    local: Option<LocalConfig>,
    cloud_blob: Option<CloudBlobConfig>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with a local destination and no databases
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        let backup_path = temp_dir.path().join("backups");
        fs::create_dir_all(&backup_path).expect("Failed to create backup dir");

        let general = GeneralConfig {
            databases: vec![],
            destination: DestinationKind::Local,
            retention_days: 7,
            default_db_type: Some("mariadb".to_string()),
            parallelism: 1,
            dump_timeout_seconds: 60,
            temp_dir: Some(temp_dir.path().join("scratch")),
            log_directory,
            log_level: "debug".to_string(),
            log_format: LogFormat::Text,
            log_max_files: 5,
        };

        let mariadb = EngineDefaults {
            host: Some("localhost".to_string()),
            port: None,
            user: Some("backup".to_string()),
            password: Some("test-password-123".to_string()),
            extra_params: vec![],
        };

        Self {
            temp_dir,
            general,
            mariadb: Some(mariadb),
            postgresql: None,
            mssql: None,
            databases: HashMap::new(),
            tools: ToolPaths::default(),
            local: Some(LocalConfig {
                backup_path: Some(backup_path),
            }),
            cloud_blob: None,
        }
    }

    /// Create a minimal config with one MariaDB database
    pub fn minimal() -> Self {
        Self::new().add_database("shop")
    }

    /// Add a database that uses the default engine and engine defaults
    pub fn add_database(mut self, name: &str) -> Self {
        self.general.databases.push(name.to_string());
        self
    }

    /// Add a database with its own override section
    pub fn add_database_with(mut self, name: &str, overrides: DatabaseOverride) -> Self {
        self.general.databases.push(name.to_string());
        self.databases.insert(name.to_string(), overrides);
        self
    }

    /// Add a database of a specific engine
    pub fn add_typed_database(self, name: &str, engine: &str) -> Self {
        self.add_database_with(
            name,
            DatabaseOverride {
                db_type: Some(engine.to_string()),
                ..Default::default()
            },
        )
    }

    /// Set engine-level defaults
    pub fn with_engine_defaults(mut self, engine: DatabaseEngine, defaults: EngineDefaults) -> Self {
        match engine {
            DatabaseEngine::MariaDb => self.mariadb = Some(defaults),
            DatabaseEngine::PostgreSql => self.postgresql = Some(defaults),
            DatabaseEngine::Mssql => self.mssql = Some(defaults),
        }
        self
    }

    pub fn with_default_db_type(mut self, engine: Option<&str>) -> Self {
        self.general.default_db_type = engine.map(str::to_string);
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.general.retention_days = days;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.general.parallelism = parallelism;
        self
    }

    pub fn with_dump_timeout(mut self, seconds: u64) -> Self {
        self.general.dump_timeout_seconds = seconds;
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Set the log directory
    pub fn with_log_dir(mut self, path: &Path) -> Self {
        self.general.log_directory = path.to_path_buf();
        self
    }

    /// Switch the destination to a blob container
    pub fn with_cloud_blob(mut self, connection_string: &str, container: &str) -> Self {
        self.general.destination = DestinationKind::CloudBlob;
        self.cloud_blob = Some(CloudBlobConfig {
            connection_string: Some(connection_string.to_string()),
            container_name: Some(container.to_string()),
            max_retries: 1,
            retry_timeout_seconds: 5,
            verify_uploads: true,
        });
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Root of the local destination
    pub fn backup_path(&self) -> Option<PathBuf> {
        self.local.as_ref().and_then(|l| l.backup_path.clone())
    }

    /// Parent directory of the per-database scratch directories
    pub fn scratch_dir(&self) -> PathBuf {
        self.temp_dir.path().join("scratch")
    }

    fn into_parts(self) -> (Config, TempDir) {
        let config = Config {
            general: self.general,
            mariadb: self.mariadb,
            postgresql: self.postgresql,
            mssql: self.mssql,
            databases: self.databases,
            tools: self.tools,
            local: self.local,
            cloud_blob: self.cloud_blob,
        };
        (config, self.temp_dir)
    }

    /// Build the Config (the temp directory is removed)
    pub fn build(self) -> Config {
        self.into_parts().0
    }

    /// Keep the temp directory alive alongside the config
    pub fn persist(self) -> (Config, TempDir) {
        self.into_parts()
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a config to TOML and write it to `path`
pub fn write_config(config: &Config, path: &Path) -> PathBuf {
    let toml_str = toml::to_string_pretty(config).expect("Failed to serialize config");
    fs::write(path, toml_str).expect("Failed to write config file");
    path.to_path_buf()
}
