//! Test context and harness for command and integration testing
//!
//! Provides a unified context for setting up and tearing down test environments.

use crate::config_builder::{write_config, ConfigBuilder};
use crate::fixtures::find_artifacts;
use anyhow::Result;
use safedb::config::Config;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test context that manages test resources and provides common utilities
pub struct TestContext {
    /// Temporary directory for test files
    temp_dir: TempDir,
    /// The test configuration
    config: Option<Config>,
    config_path: Option<PathBuf>,
}

impl TestContext {
    /// Create a new test context with a temporary directory
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            config: None,
            config_path: None,
        }
    }

    /// Create a test context with a minimal configuration
    pub fn with_minimal_config() -> Self {
        Self::from_builder(ConfigBuilder::minimal())
    }

    /// Create a test context from a ConfigBuilder, writing `config.toml`
    pub fn from_builder(builder: ConfigBuilder) -> Self {
        let (config, temp_dir) = builder.persist();
        let config_path = write_config(&config, &temp_dir.path().join("config.toml"));

        Self {
            temp_dir,
            config: Some(config),
            config_path: Some(config_path),
        }
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the configuration
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Root of the local destination
    pub fn backup_root(&self) -> PathBuf {
        self.temp_dir.path().join("backups")
    }

    /// Scratch directory used for in-flight dumps
    pub fn scratch_dir(&self) -> PathBuf {
        self.temp_dir.path().join("scratch")
    }

    /// Artifacts currently held by the local destination
    pub fn stored_artifacts(&self) -> Vec<PathBuf> {
        find_artifacts(&self.backup_root())
    }

    /// Entries left in the scratch directory (lock files excluded)
    pub fn scratch_leftovers(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.scratch_dir()) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e != "lock").unwrap_or(true))
            .collect()
    }

    /// Create a subdirectory in the temp dir
    pub fn create_subdir(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::create_dir_all(&path).expect("Failed to create subdirectory");
        path
    }

    /// Create a file in the temp dir
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Check if a file exists in the temp directory
    pub fn file_exists(&self, name: &str) -> bool {
        self.temp_dir.path().join(name).exists()
    }

    /// Read a file from the temp directory
    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.temp_dir.path().join(name);
        Ok(std::fs::read_to_string(path)?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Err and the error message contains the given string
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Expected error containing '{}', got: {}",
                    needle,
                    err_msg
                );
            }
        }
    }
}
