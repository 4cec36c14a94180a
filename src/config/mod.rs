//! Configuration module for safedb
//!
//! This module handles loading, validating, and resolving configuration from TOML files.
//!
//! ## Configuration Inheritance
//!
//! Connection settings for a database are resolved in this order (later overrides earlier):
//! 1. Engine default port
//! 2. Engine section (`[mariadb]`, `[postgresql]`, `[mssql]`)
//! 3. Database section (`[databases.<name>]`)
//!
//! ## Example Usage
//!
//! ```no_run
//! use safedb::config;
//!
//! let config = config::load_config("safedb.toml")?;
//!
//! for resolved in config::resolve_all_targets(&config) {
//!     match resolved.target {
//!         Ok(target) => println!("{}: {} on {}", resolved.name, target.engine, target.host),
//!         Err(reason) => println!("{}: invalid ({})", resolved.name, reason),
//!     }
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod connection;
mod loader;
mod target;
mod types;

pub use connection::AzureConnection;
pub use loader::{
    load_config, resolve_all_targets, resolve_destination, resolve_target, resolve_temp_dir,
    validate, ConfigError, Result, ValidationReport,
};
pub use target::{DatabaseEngine, DatabaseTarget, ResolvedTarget};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
