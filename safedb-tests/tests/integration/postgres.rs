//! PostgreSQL integration tests
//!
//! These tests require Docker and verify real pg_dump backups end to end.
//! Run with: `cargo test -p safedb-tests --test integration -- --ignored`

use super::common::*;
use safedb::config::{DatabaseEngine, EngineDefaults, ToolPaths};
use safedb::error::BackupError;
use safedb::utils::hasher::digest_file;
use test_utils::{gunzip_file, ConfigBuilder, TestContext};

const IMAGE: &str = "postgres:16-alpine";

fn start_postgres(name: &str) -> anyhow::Result<ContainerGuard> {
    let guard = start_container(
        name,
        &["POSTGRES_PASSWORD=testpass", "POSTGRES_DB=inventory"],
        IMAGE,
    )?;
    wait_until_ready(name, &["pg_isready", "-U", "postgres", "-d", "inventory"])?;

    docker_exec(
        name,
        &[
            "psql", "-U", "postgres", "-d", "inventory", "-c",
            "CREATE TABLE parts (id SERIAL PRIMARY KEY, label TEXT); \
             INSERT INTO parts (label) VALUES ('bolt'), ('nut'), ('washer');",
        ],
    )?;
    Ok(guard)
}

fn builder(container: &str, tool_dir: &std::path::Path, password: &str) -> ConfigBuilder {
    let pg_dump = container_tool(tool_dir, container, "pg_dump", "PGPASSWORD");

    ConfigBuilder::new()
        .with_default_db_type(Some("postgresql"))
        .add_database("inventory")
        .with_engine_defaults(
            DatabaseEngine::PostgreSql,
            EngineDefaults {
                host: Some("localhost".to_string()),
                port: Some(5432),
                user: Some("postgres".to_string()),
                password: Some(password.to_string()),
                extra_params: vec![],
            },
        )
        .with_tools(ToolPaths {
            pg_dump: pg_dump.display().to_string(),
            ..Default::default()
        })
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_postgres_backup() {
    if !is_docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let name = container_name("pg");
    let guard = start_postgres(&name).expect("Failed to start PostgreSQL");

    let tools = tempfile::TempDir::new().unwrap();
    let ctx = TestContext::from_builder(builder(guard.name(), tools.path(), "testpass"));

    let report = run_backup(&ctx).await.expect("Backup run failed");
    let entry = report.entry("inventory").unwrap();
    assert!(entry.outcome.is_success(), "{:?}", entry.outcome);

    let stored = ctx.backup_root().join(entry.destination_key.as_deref().unwrap());
    let sql = String::from_utf8(gunzip_file(&stored)).unwrap();
    assert!(sql.contains("CREATE TABLE public.parts"));
    assert!(sql.contains("washer"));

    let digest = digest_file(&stored).await.unwrap();
    assert_eq!(entry.digest.as_deref(), Some(digest.as_str()));
    assert!(ctx.scratch_leftovers().is_empty());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_postgres_unknown_role() {
    if !is_docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let name = container_name("pg-role");
    let guard = start_postgres(&name).expect("Failed to start PostgreSQL");

    let tools = tempfile::TempDir::new().unwrap();
    let ctx = TestContext::from_builder(
        builder(guard.name(), tools.path(), "wrong")
            .with_engine_defaults(
                DatabaseEngine::PostgreSql,
                EngineDefaults {
                    host: Some("127.0.0.1".to_string()),
                    port: Some(5432),
                    user: Some("nobody".to_string()),
                    password: Some("wrong".to_string()),
                    extra_params: vec![],
                },
            ),
    );

    let report = run_backup(&ctx).await.expect("Backup run failed");
    match report.entry("inventory").unwrap().outcome.error() {
        Some(BackupError::DumpFailed { exit_code, .. }) => assert_ne!(*exit_code, Some(0)),
        other => panic!("expected DumpFailed, got {:?}", other),
    }
    assert!(ctx.stored_artifacts().is_empty());
}
