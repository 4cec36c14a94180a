//! Test utilities for safedb
//!
//! This crate provides shared test utilities, mock implementations,
//! and helper functions for testing the safedb backup orchestrator.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, MockDump, MockExecutor, TestContext};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let ctx = TestContext::from_builder(ConfigBuilder::minimal());
//!     let executor = MockExecutor::new().expect("shop", MockDump::Empty);
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::{write_config, ConfigBuilder};
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use safedb::config::{
    Config, DatabaseEngine, DatabaseOverride, DatabaseTarget, EngineDefaults, ResolvedTarget,
    ToolPaths,
};

// Re-export mock implementations from the main crate
pub use safedb::utils::clock::FixedClock;
pub use safedb::utils::executor::mock::{DumpCall, MockDump, MockExecutor};
pub use safedb::utils::executor::DumpExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
