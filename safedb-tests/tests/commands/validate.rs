//! Tests for the 'validate' command
//!
//! The validate command checks the configuration and resolves every database
//! without running a dump tool or touching the destination.

use safedb::commands;
use test_utils::{ConfigBuilder, ResultAssertions, TestContext};

#[test]
fn test_validate_valid_config() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_database("crm")
            .add_typed_database("analytics", "postgresql")
            .with_engine_defaults(
                safedb::config::DatabaseEngine::PostgreSql,
                safedb::config::EngineDefaults {
                    host: Some("pg.internal".to_string()),
                    user: Some("postgres".to_string()),
                    ..Default::default()
                },
            ),
    );

    let report = commands::validate(ctx.config_path().unwrap()).assert_ok();
    assert!(report.is_valid());
    assert_eq!(report.targets.len(), 3);

    let out = commands::render_validation(&report);
    assert!(out.contains("shop: OK (mariadb on localhost:3306)"));
    assert!(out.contains("analytics: OK (postgresql on pg.internal:5432)"));
    assert!(out.contains("Configuration is valid!"));
    assert!(!out.contains("test-password-123"));
}

#[test]
fn test_validate_unsupported_engine_is_per_database() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal().add_typed_database("legacy", "oracle"),
    );

    let report = commands::validate(ctx.config_path().unwrap()).assert_ok();
    assert!(!report.is_valid());
    assert_eq!(report.invalid_count(), 1);

    let out = commands::render_validation(&report);
    assert!(out.contains("shop: OK"));
    assert!(out.contains("legacy: ConfigInvalid: Unsupported database type 'oracle'"));
    assert!(out.contains("1 invalid database(s)"));
}

#[test]
fn test_validate_missing_host() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().add_typed_database("erp", "mssql"));

    let report = commands::validate(ctx.config_path().unwrap()).assert_ok();
    let erp = report.targets.iter().find(|t| t.name == "erp").unwrap();
    let reason = erp.target.as_ref().unwrap_err();
    assert!(reason.contains("host"), "unexpected reason: {}", reason);
}

#[test]
fn test_validate_invalid_toml() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file("config.toml", "invalid { toml content");

    commands::validate(&config_path).assert_err_contains("Invalid configuration");
}

#[test]
fn test_validate_missing_file() {
    let ctx = TestContext::new();
    let result = commands::validate(&ctx.temp_dir().join("nope.toml"));
    assert!(result.is_err());
}

#[test]
fn test_validate_does_not_touch_destination() {
    let ctx = TestContext::with_minimal_config();
    std::fs::remove_dir_all(ctx.backup_root()).unwrap();

    commands::validate(ctx.config_path().unwrap()).assert_ok();
    assert!(!ctx.backup_root().exists());
    assert!(!ctx.scratch_dir().exists());
}
