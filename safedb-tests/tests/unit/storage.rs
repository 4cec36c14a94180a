//! Destination contract, checked against every destination kind

use chrono::{DateTime, Duration, TimeZone, Utc};
use object_store::memory::InMemory;
use rstest::rstest;
use safedb::artifact::BackupArtifact;
use safedb::config::DatabaseEngine;
use safedb::storage::{BlobStore, Destination, DestinationStore, LocalStore, StorageError};
use safedb::utils::hasher::digest_file;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Local,
    Blob,
}

fn destination(kind: Kind, root: &Path) -> Destination {
    match kind {
        Kind::Local => Destination::Local(LocalStore::new(root.join("dest"))),
        Kind::Blob => Destination::CloudBlob(BlobStore::new(Arc::new(InMemory::new()), "backups")),
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 20, 23, 59, 59).unwrap()
}

async fn artifact(scratch: &Path, database: &str, created_at: DateTime<Utc>, body: &[u8]) -> BackupArtifact {
    let path = scratch.join(format!("{}-{}.sql.gz", database, created_at.timestamp()));
    std::fs::write(&path, body).unwrap();
    BackupArtifact {
        database_name: database.to_string(),
        engine: DatabaseEngine::MariaDb,
        host: "db-01".to_string(),
        created_at,
        local_path: path.clone(),
        size_bytes: body.len() as u64,
        digest: Some(digest_file(&path).await.unwrap()),
        destination_key: None,
    }
}

#[rstest]
#[case(Kind::Local)]
#[case(Kind::Blob)]
#[tokio::test]
async fn test_store_then_verify(#[case] kind: Kind) {
    let temp = TempDir::new().unwrap();
    let dest = destination(kind, temp.path());

    let a = artifact(temp.path(), "shop", base_time(), b"-- dump\n").await;
    let key = dest.store(&a).await.unwrap();

    assert_eq!(key, "db-01/shop/mariadb_shop_20240520T235959Z.sql.gz");
    dest.verify(&key, a.digest.as_deref().unwrap()).await.unwrap();
}

#[rstest]
#[case(Kind::Local)]
#[case(Kind::Blob)]
#[tokio::test]
async fn test_verify_detects_wrong_digest(#[case] kind: Kind) {
    let temp = TempDir::new().unwrap();
    let dest = destination(kind, temp.path());

    let a = artifact(temp.path(), "shop", base_time(), b"-- dump\n").await;
    let key = dest.store(&a).await.unwrap();

    let err = dest.verify(&key, &"0".repeat(64)).await.unwrap_err();
    assert!(matches!(err, StorageError::DigestMismatch { .. }), "got {:?}", err);
}

#[rstest]
#[case(Kind::Local)]
#[case(Kind::Blob)]
#[tokio::test]
async fn test_same_key_is_never_overwritten(#[case] kind: Kind) {
    let temp = TempDir::new().unwrap();
    let dest = destination(kind, temp.path());

    let first = artifact(temp.path(), "shop", base_time(), b"first").await;
    let key = dest.store(&first).await.unwrap();

    let mut second = artifact(temp.path(), "shop-2", base_time(), b"second").await;
    second.database_name = "shop".to_string();

    let err = dest.store(&second).await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)), "got {:?}", err);

    // the original bytes are still the ones stored
    dest.verify(&key, first.digest.as_deref().unwrap()).await.unwrap();
}

#[rstest]
#[case(Kind::Local)]
#[case(Kind::Blob)]
#[tokio::test]
async fn test_list_is_scoped_and_ordered(#[case] kind: Kind) {
    let temp = TempDir::new().unwrap();
    let dest = destination(kind, temp.path());

    for days_ago in [2, 0, 5] {
        let at = base_time() - Duration::days(days_ago);
        dest.store(&artifact(temp.path(), "shop", at, b"shop").await)
            .await
            .unwrap();
    }
    dest.store(&artifact(temp.path(), "crm", base_time(), b"crm").await)
        .await
        .unwrap();

    let listed = dest.list("db-01", "shop").await.unwrap();
    let times: Vec<_> = listed.iter().map(|r| r.created_at).collect();
    assert_eq!(
        times,
        vec![
            base_time() - Duration::days(5),
            base_time() - Duration::days(2),
            base_time(),
        ]
    );
    assert!(listed.iter().all(|r| r.destination_key.starts_with("db-01/shop/")));

    assert!(dest.list("db-02", "shop").await.unwrap().is_empty());
}

#[rstest]
#[case(Kind::Local)]
#[case(Kind::Blob)]
#[tokio::test]
async fn test_delete(#[case] kind: Kind) {
    let temp = TempDir::new().unwrap();
    let dest = destination(kind, temp.path());

    let key = dest
        .store(&artifact(temp.path(), "shop", base_time(), b"x").await)
        .await
        .unwrap();

    dest.delete(&key).await.unwrap();
    assert!(dest.list("db-01", "shop").await.unwrap().is_empty());

    let err = dest.delete(&key).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)), "got {:?}", err);
}

#[rstest]
#[case(Kind::Local)]
#[case(Kind::Blob)]
#[tokio::test]
async fn test_keys_cannot_escape_the_root(#[case] kind: Kind) {
    let temp = TempDir::new().unwrap();
    let dest = destination(kind, temp.path());

    let err = dest.delete("../outside.sql.gz").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_local_sidecar_matches_sha256sum_format() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path().join("dest"));

    let a = artifact(temp.path(), "shop", base_time(), b"payload").await;
    let key = store.store(&a).await.unwrap();

    let sidecar = std::fs::read_to_string(store.root().join(format!("{}.sha256", key))).unwrap();
    assert_eq!(
        sidecar,
        format!(
            "{}  mariadb_shop_20240520T235959Z.sql.gz\n",
            a.digest.as_deref().unwrap()
        )
    );
}
