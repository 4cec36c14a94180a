use super::connection::AzureConnection;
use super::target::{DatabaseEngine, DatabaseTarget, ResolvedTarget};
use super::types::*;
use super::expand_tilde;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unsupported database type '{0}'")]
    UnsupportedEngine(String),

    #[error("Missing required field '{field}' for database '{database}'")]
    MissingField { database: String, field: &'static str },

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
///
/// Only global problems fail here; per-database problems are reported when
/// targets are resolved.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate global settings
fn validate_config(config: &Config) -> Result<()> {
    if config.general.databases.is_empty() {
        return Err(ConfigError::ValidationError(
            "No databases configured in [general].databases".to_string(),
        ));
    }

    if config.general.parallelism == 0 {
        return Err(ConfigError::ValidationError(
            "[general].parallelism must be at least 1".to_string(),
        ));
    }

    resolve_destination(config)?;

    Ok(())
}

/// Resolve the destination settings for the configured kind
pub fn resolve_destination(config: &Config) -> Result<DestinationConfig> {
    match config.general.destination {
        DestinationKind::Local => {
            let backup_path = config
                .local
                .as_ref()
                .and_then(|l| l.backup_path.as_ref())
                .ok_or_else(|| {
                    ConfigError::InvalidDestination(
                        "destination 'local' requires [local].backup_path".to_string(),
                    )
                })?;

            Ok(DestinationConfig::Local {
                backup_path: expand_tilde(backup_path),
            })
        }
        DestinationKind::CloudBlob => {
            let section = config.cloud_blob.as_ref().ok_or_else(|| {
                ConfigError::InvalidDestination(
                    "destination 'cloud_blob' requires a [cloud_blob] section".to_string(),
                )
            })?;

            let connection_string = non_empty(section.connection_string.as_deref())
                .ok_or_else(|| {
                    ConfigError::InvalidDestination(
                        "[cloud_blob].connection_string is required".to_string(),
                    )
                })?;
            let container_name = non_empty(section.container_name.as_deref())
                .ok_or_else(|| {
                    ConfigError::InvalidDestination(
                        "[cloud_blob].container_name is required".to_string(),
                    )
                })?;

            Ok(DestinationConfig::CloudBlob(CloudBlobSettings {
                connection: AzureConnection::parse(connection_string)?,
                container_name: container_name.to_string(),
                max_retries: section.max_retries,
                retry_timeout_seconds: section.retry_timeout_seconds,
                verify_uploads: section.verify_uploads,
            }))
        }
    }
}

/// Scratch directory for in-flight dumps
pub fn resolve_temp_dir(config: &Config) -> PathBuf {
    config
        .general
        .temp_dir
        .as_deref()
        .map(expand_tilde)
        .unwrap_or_else(|| std::env::temp_dir().join("safedb"))
}

fn engine_defaults(config: &Config, engine: DatabaseEngine) -> Option<&EngineDefaults> {
    match engine {
        DatabaseEngine::MariaDb => config.mariadb.as_ref(),
        DatabaseEngine::PostgreSql => config.postgresql.as_ref(),
        DatabaseEngine::Mssql => config.mssql.as_ref(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve a database by merging its overrides with the engine defaults
pub fn resolve_target(name: &str, config: &Config) -> Result<DatabaseTarget> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ConfigError::ValidationError(
            "database name must not be empty".to_string(),
        ));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(ConfigError::ValidationError(format!(
            "database name '{}' must not contain path separators",
            name
        )));
    }

    let overrides = config.databases.get(name);

    // Engine: database type > general default
    let engine_name = overrides
        .and_then(|o| non_empty(o.db_type.as_deref()))
        .or_else(|| non_empty(config.general.default_db_type.as_deref()))
        .ok_or(ConfigError::MissingField {
            database: name.to_string(),
            field: "type",
        })?;
    let engine: DatabaseEngine = engine_name.parse()?;

    let defaults = engine_defaults(config, engine);

    // Each field: database > engine defaults
    let host = non_empty(overrides.and_then(|o| o.host.as_deref()))
        .or_else(|| non_empty(defaults.and_then(|d| d.host.as_deref())))
        .ok_or(ConfigError::MissingField {
            database: name.to_string(),
            field: "host",
        })?;

    let user = non_empty(overrides.and_then(|o| o.user.as_deref()))
        .or_else(|| non_empty(defaults.and_then(|d| d.user.as_deref())))
        .ok_or(ConfigError::MissingField {
            database: name.to_string(),
            field: "user",
        })?;

    let port = overrides
        .and_then(|o| o.port)
        .or_else(|| defaults.and_then(|d| d.port))
        .unwrap_or_else(|| engine.default_port());

    let password = overrides
        .and_then(|o| o.password.clone())
        .or_else(|| defaults.and_then(|d| d.password.clone()))
        .filter(|p| !p.is_empty());

    let extra_params = overrides
        .and_then(|o| o.extra_params.clone())
        .or_else(|| defaults.map(|d| d.extra_params.clone()))
        .unwrap_or_default();

    Ok(DatabaseTarget {
        name: name.to_string(),
        engine,
        host: host.to_string(),
        port,
        user: user.to_string(),
        password,
        extra_params,
    })
}

/// Resolve every configured database, in configuration order
///
/// A database that fails to resolve is returned as an invalid entry instead
/// of failing the whole configuration.
pub fn resolve_all_targets(config: &Config) -> Vec<ResolvedTarget> {
    let mut seen = HashSet::new();

    config
        .general
        .databases
        .iter()
        .map(|name| {
            if !seen.insert(name.trim().to_string()) {
                return ResolvedTarget::invalid(
                    name.clone(),
                    format!("database '{}' is listed more than once", name),
                );
            }

            match resolve_target(name, config) {
                Ok(target) => ResolvedTarget::valid(target),
                Err(e) => ResolvedTarget::invalid(name.clone(), e.to_string()),
            }
        })
        .collect()
}

/// Result of checking a configuration without running anything
#[derive(Debug)]
pub struct ValidationReport {
    pub destination: DestinationKind,
    pub retention_days: u32,
    pub targets: Vec<ResolvedTarget>,
}

impl ValidationReport {
    pub fn invalid_count(&self) -> usize {
        self.targets.iter().filter(|t| !t.is_valid()).count()
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_count() == 0
    }
}

/// Load a configuration and resolve every database without touching any
/// database or destination
pub fn validate<P: AsRef<Path>>(path: P) -> Result<ValidationReport> {
    let config = load_config(path)?;

    Ok(ValidationReport {
        destination: config.general.destination,
        retention_days: config.general.retention_days,
        targets: resolve_all_targets(&config),
    })
}
