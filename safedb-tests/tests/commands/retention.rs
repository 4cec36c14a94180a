//! Retention applied by whole backup runs
//!
//! These runs use a pinned clock so artifact ages are exact.

use chrono::{DateTime, Duration, TimeZone, Utc};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStoreExt;
use async_trait::async_trait;
use safedb::artifact::{artifact_filename, BackupArtifact, StoredArtifactRef};
use safedb::config::{resolve_all_targets, DatabaseEngine};
use safedb::context::RunContext;
use safedb::error::BackupError;
use safedb::managers::backup::BackupOrchestrator;
use safedb::storage::{
    BlobStore, Destination, DestinationStore, LocalStore, Result as StorageResult, StorageError,
};
use std::path::Path;
use std::sync::Arc;
use test_utils::{ConfigBuilder, FixedClock, MockDump, MockExecutor, TestResult};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 3, 2, 15, 0).unwrap()
}

fn ctx(scratch: &Path) -> RunContext {
    RunContext::new(scratch.to_path_buf()).with_clock(Arc::new(FixedClock::new(now())))
}

/// Place an old artifact straight into a local destination
fn seed_local(root: &Path, database: &str, created_at: DateTime<Utc>) -> String {
    let filename = artifact_filename(DatabaseEngine::MariaDb, database, created_at);
    let dir = root.join("localhost").join(database);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(&filename), b"old").unwrap();
    format!("localhost/{}/{}", database, filename)
}

/// Local store whose deletes of one key always fail
struct FailingDelete {
    inner: LocalStore,
    broken_key: String,
}

#[async_trait]
impl DestinationStore for FailingDelete {
    async fn store(&self, artifact: &BackupArtifact) -> StorageResult<String> {
        self.inner.store(artifact).await
    }

    async fn verify(&self, key: &str, digest: &str) -> StorageResult<()> {
        self.inner.verify(key, digest).await
    }

    async fn list(&self, host: &str, database: &str) -> StorageResult<Vec<StoredArtifactRef>> {
        self.inner.list(host, database).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if key == self.broken_key {
            return Err(StorageError::Backend("permission denied".to_string()));
        }
        self.inner.delete(key).await
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[tokio::test]
async fn test_expired_artifacts_are_pruned() -> TestResult {
    let builder = ConfigBuilder::minimal().with_retention_days(7);
    let root = builder.backup_path().unwrap();
    let scratch = builder.scratch_dir();
    let (config, _temp) = builder.persist();

    // ages 0 (an hour earlier today), 1, 8 and 10 days
    let today = seed_local(&root, "shop", now() - Duration::hours(1));
    let yesterday = seed_local(&root, "shop", now() - Duration::days(1));
    let eight = seed_local(&root, "shop", now() - Duration::days(8));
    let ten = seed_local(&root, "shop", now() - Duration::days(10));

    let store = LocalStore::new(root.clone());
    let report = BackupOrchestrator::from_config(&config, Arc::new(MockExecutor::new()))
        .run(&resolve_all_targets(&config), &store, 7, &ctx(&scratch))
        .await?;

    let entry = report.entry("shop").unwrap();
    assert!(entry.outcome.is_success(), "{:?}", entry.outcome);

    let mut pruned = entry.pruned.clone();
    pruned.sort();
    let mut expected = vec![eight, ten];
    expected.sort();
    assert_eq!(pruned, expected);

    let remaining: Vec<_> = store
        .list("localhost", "shop")
        .await?
        .into_iter()
        .map(|r| r.destination_key)
        .collect();
    assert_eq!(remaining.len(), 3);
    assert!(remaining.contains(&today));
    assert!(remaining.contains(&yesterday));
    assert!(remaining.contains(entry.destination_key.as_ref().unwrap()));
    Ok(())
}

#[tokio::test]
async fn test_pruning_is_scoped_to_the_database() -> TestResult {
    let builder = ConfigBuilder::minimal().with_retention_days(7);
    let root = builder.backup_path().unwrap();
    let scratch = builder.scratch_dir();
    let (config, _temp) = builder.persist();

    let other = seed_local(&root, "crm", now() - Duration::days(90));
    let other_older = seed_local(&root, "crm", now() - Duration::days(120));

    let store = LocalStore::new(root.clone());
    let report = BackupOrchestrator::from_config(&config, Arc::new(MockExecutor::new()))
        .run(&resolve_all_targets(&config), &store, 7, &ctx(&scratch))
        .await?;

    assert!(report.entry("shop").unwrap().pruned.is_empty());
    assert!(root.join(&other).exists());
    assert!(root.join(&other_older).exists());
    Ok(())
}

#[tokio::test]
async fn test_failed_backup_skips_pruning() -> TestResult {
    let builder = ConfigBuilder::minimal().with_retention_days(7);
    let root = builder.backup_path().unwrap();
    let scratch = builder.scratch_dir();
    let (config, _temp) = builder.persist();

    let old = seed_local(&root, "shop", now() - Duration::days(30));
    let older = seed_local(&root, "shop", now() - Duration::days(40));

    let executor = MockExecutor::new().expect(
        "shop",
        MockDump::Failure {
            exit_code: 2,
            stderr: "server has gone away".to_string(),
        },
    );
    let store = LocalStore::new(root.clone());
    let report = BackupOrchestrator::from_config(&config, Arc::new(executor))
        .run(&resolve_all_targets(&config), &store, 7, &ctx(&scratch))
        .await?;

    assert!(!report.is_success());
    assert!(root.join(&old).exists());
    assert!(root.join(&older).exists());
    Ok(())
}

#[tokio::test]
async fn test_same_second_rerun_collides() -> TestResult {
    let builder = ConfigBuilder::minimal();
    let root = builder.backup_path().unwrap();
    let scratch = builder.scratch_dir();
    let (config, _temp) = builder.persist();

    let store = LocalStore::new(root.clone());
    let orchestrator = BackupOrchestrator::from_config(&config, Arc::new(MockExecutor::new()));
    let targets = resolve_all_targets(&config);
    let ctx = ctx(&scratch);

    let first = orchestrator.run(&targets, &store, 7, &ctx).await?;
    let key = first.entry("shop").unwrap().destination_key.clone().unwrap();
    let original = std::fs::read(root.join(&key))?;

    let second = orchestrator.run(&targets, &store, 7, &ctx).await?;
    match second.entry("shop").unwrap().outcome.error() {
        Some(BackupError::StorageFailed(reason)) => assert!(reason.contains("refusing to overwrite")),
        other => panic!("expected StorageFailed, got {:?}", other),
    }
    assert_eq!(std::fs::read(root.join(&key))?, original);
    Ok(())
}

#[tokio::test]
async fn test_blob_destination_run() -> TestResult {
    let builder = ConfigBuilder::minimal()
        .add_typed_database("analytics", "postgresql")
        .with_engine_defaults(
            DatabaseEngine::PostgreSql,
            safedb::config::EngineDefaults {
                host: Some("pg.internal".to_string()),
                user: Some("postgres".to_string()),
                ..Default::default()
            },
        )
        .with_parallelism(2);
    let scratch = builder.scratch_dir();
    let (config, _temp) = builder.persist();

    let memory = Arc::new(InMemory::new());

    // an expired artifact that retention should remove
    let stale_key = format!(
        "pg.internal/analytics/{}",
        artifact_filename(DatabaseEngine::PostgreSql, "analytics", now() - Duration::days(30))
    );
    memory
        .put(&ObjectPath::from(stale_key.as_str()), "stale".into())
        .await?;

    let destination = Destination::CloudBlob(BlobStore::new(memory.clone(), "backups"));
    let report = BackupOrchestrator::from_config(&config, Arc::new(MockExecutor::new()))
        .run(&resolve_all_targets(&config), &destination, 7, &ctx(&scratch))
        .await?;

    assert!(report.is_success(), "{}", report.to_json()?);

    let analytics = report.entry("analytics").unwrap();
    assert_eq!(analytics.pruned, vec![stale_key.clone()]);
    let key = analytics.destination_key.as_deref().unwrap();
    assert_eq!(
        key,
        "pg.internal/analytics/postgresql_analytics_20241103T021500Z.sql.gz"
    );

    assert!(memory.head(&ObjectPath::from(key)).await.is_ok());
    assert!(memory.head(&ObjectPath::from(format!("{}.sha256", key))).await.is_ok());
    assert!(memory.head(&ObjectPath::from(stale_key.as_str())).await.is_err());

    let shop = destination.list("localhost", "shop").await?;
    assert_eq!(shop.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_delete_does_not_block_the_rest() -> TestResult {
    let builder = ConfigBuilder::minimal().add_database("crm").with_retention_days(7);
    let root = builder.backup_path().unwrap();
    let scratch = builder.scratch_dir();
    let (config, _temp) = builder.persist();

    let stuck = seed_local(&root, "shop", now() - Duration::days(20));
    let removable = seed_local(&root, "shop", now() - Duration::days(21));
    let crm_old = seed_local(&root, "crm", now() - Duration::days(30));

    let store = FailingDelete {
        inner: LocalStore::new(root.clone()),
        broken_key: stuck.clone(),
    };
    let report = BackupOrchestrator::from_config(&config, Arc::new(MockExecutor::new()))
        .run(&resolve_all_targets(&config), &store, 7, &ctx(&scratch))
        .await?;

    let shop = report.entry("shop").unwrap();
    match shop.outcome.error() {
        Some(BackupError::RetentionFailed(reason)) => assert!(reason.contains(&stuck)),
        other => panic!("expected RetentionFailed, got {:?}", other),
    }
    // the new backup is stored and reported even though pruning failed
    let key = shop.destination_key.as_deref().unwrap();
    assert!(root.join(key).exists());
    assert!(shop.digest.is_some());
    assert_eq!(shop.pruned, vec![removable.clone()]);
    assert!(!root.join(&removable).exists());
    assert!(root.join(&stuck).exists());

    let crm = report.entry("crm").unwrap();
    assert!(crm.outcome.is_success());
    assert_eq!(crm.pruned, vec![crm_old]);
    Ok(())
}
