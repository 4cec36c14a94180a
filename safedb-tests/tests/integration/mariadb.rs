//! MariaDB integration tests
//!
//! Run with: `cargo test -p safedb-tests --test integration -- --ignored`

use super::common::*;
use safedb::config::{DatabaseEngine, EngineDefaults, ToolPaths};
use test_utils::{gunzip_file, ConfigBuilder, TestContext};

const IMAGE: &str = "mariadb:11";

#[tokio::test]
#[ignore] // Requires Docker
async fn test_mariadb_backup() {
    if !is_docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let name = container_name("maria");
    let guard = start_container(
        &name,
        &["MARIADB_ROOT_PASSWORD=rootpass", "MARIADB_DATABASE=shop"],
        IMAGE,
    )
    .expect("Failed to start MariaDB");
    wait_until_ready(
        guard.name(),
        &["mariadb", "-uroot", "-prootpass", "-e", "SELECT 1", "shop"],
    )
    .expect("MariaDB failed to become ready");

    docker_exec(
        guard.name(),
        &[
            "mariadb", "-uroot", "-prootpass", "shop", "-e",
            "CREATE TABLE orders (id INT PRIMARY KEY, total DECIMAL(8,2)); \
             INSERT INTO orders VALUES (1, 9.99), (2, 24.50);",
        ],
    )
    .expect("Failed to seed data");

    let tools = tempfile::TempDir::new().unwrap();
    let mariadb_dump = container_tool(tools.path(), guard.name(), "mariadb-dump", "MYSQL_PWD");

    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .with_engine_defaults(
                DatabaseEngine::MariaDb,
                EngineDefaults {
                    host: Some("localhost".to_string()),
                    port: Some(3306),
                    user: Some("root".to_string()),
                    password: Some("rootpass".to_string()),
                    extra_params: vec!["--single-transaction".to_string()],
                },
            )
            .with_tools(ToolPaths {
                mariadb_dump: mariadb_dump.display().to_string(),
                ..Default::default()
            }),
    );

    let report = run_backup(&ctx).await.expect("Backup run failed");
    let entry = report.entry("shop").unwrap();
    assert!(entry.outcome.is_success(), "{:?}", entry.outcome);

    let stored = ctx.backup_root().join(entry.destination_key.as_deref().unwrap());
    let sql = String::from_utf8(gunzip_file(&stored)).unwrap();
    assert!(sql.contains("CREATE TABLE `orders`"));
    assert!(sql.contains("24.50"));
}
