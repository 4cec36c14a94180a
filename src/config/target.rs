//! Resolved database targets

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::loader::ConfigError;

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    MariaDb,
    PostgreSql,
    Mssql,
}

impl DatabaseEngine {
    pub const ALL: [DatabaseEngine; 3] = [
        DatabaseEngine::MariaDb,
        DatabaseEngine::PostgreSql,
        DatabaseEngine::Mssql,
    ];

    /// Port used when neither the database nor the engine section sets one
    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseEngine::MariaDb => 3306,
            DatabaseEngine::PostgreSql => 5432,
            DatabaseEngine::Mssql => 1433,
        }
    }

    /// Lowercase name used in config keys and artifact filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseEngine::MariaDb => "mariadb",
            DatabaseEngine::PostgreSql => "postgresql",
            DatabaseEngine::Mssql => "mssql",
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseEngine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mariadb" | "mysql" => Ok(DatabaseEngine::MariaDb),
            "postgresql" | "postgres" | "pg" => Ok(DatabaseEngine::PostgreSql),
            "mssql" | "sqlserver" => Ok(DatabaseEngine::Mssql),
            other => Err(ConfigError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// One database to back up, after merging engine defaults with its overrides
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub name: String,
    pub engine: DatabaseEngine,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub extra_params: Vec<String>,
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("name", &self.name)
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("extra_params", &self.extra_params)
            .finish()
    }
}

/// Outcome of resolving one configured database name
///
/// Resolution failures are kept per database so that one bad entry does not
/// prevent the remaining databases from being backed up.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub name: String,
    pub target: Result<DatabaseTarget, String>,
}

impl ResolvedTarget {
    pub fn valid(target: DatabaseTarget) -> Self {
        Self {
            name: target.name.clone(),
            target: Ok(target),
        }
    }

    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: Err(reason.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.target.is_ok()
    }
}
