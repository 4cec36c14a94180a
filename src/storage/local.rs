//! Local filesystem destination

use super::{key_segments, sort_oldest_first, DestinationStore, Result, StorageError};
use crate::artifact::{
    database_prefix, digest_file_contents, digest_key, is_artifact_name, parse_artifact_timestamp,
    BackupArtifact, StoredArtifactRef,
};
use crate::utils::hasher::digest_file;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Stores artifacts under a root directory, one subdirectory per host and database
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(key_segments(key)?
            .into_iter()
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    fn key_for(&self, prefix: &str, filename: &str) -> String {
        format!("{}/{}", prefix, filename)
    }
}

/// In-progress copy that is removed unless committed
///
/// Dropping the store future mid-copy still cleans up.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial file {}: {}", self.path.display(), e),
        }
    }
}

#[async_trait]
impl DestinationStore for LocalStore {
    async fn store(&self, artifact: &BackupArtifact) -> Result<String> {
        let digest = artifact.digest.as_deref().ok_or(StorageError::MissingDigest)?;
        let key = artifact.key();
        let dest = self.path_for(&key)?;

        if fs::try_exists(&dest).await? {
            return Err(StorageError::AlreadyExists(key));
        }

        let parent = dest
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.clone()))?;
        fs::create_dir_all(parent).await?;

        let filename = artifact.filename();
        let partial = PartialFile::new(parent.join(format!("{}.partial", filename)));

        fs::copy(&artifact.local_path, partial.path()).await?;
        fs::rename(partial.path(), &dest).await?;
        partial.commit();

        let sidecar = self.path_for(&digest_key(&key))?;
        if let Err(e) = fs::write(&sidecar, digest_file_contents(digest, &filename)).await {
            if let Err(cleanup) = fs::remove_file(&dest).await {
                warn!("Failed to remove {} after sidecar error: {}", dest.display(), cleanup);
            }
            return Err(e.into());
        }

        info!("Stored {} in {}", key, self.root.display());
        Ok(key)
    }

    async fn verify(&self, key: &str, digest: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let actual = digest_file(&path).await?;
        if actual != digest {
            return Err(StorageError::DigestMismatch {
                key: key.to_string(),
                expected: digest.to_string(),
                actual,
            });
        }

        debug!("Verified {} ({})", key, digest);
        Ok(())
    }

    async fn list(&self, host: &str, database: &str) -> Result<Vec<StoredArtifactRef>> {
        let prefix = database_prefix(host, database);
        let dir = self.path_for(&prefix)?;

        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut refs = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_artifact_name(&name) {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let created_at = match parse_artifact_timestamp(&name) {
                Some(ts) => ts,
                None => match metadata.modified() {
                    Ok(mtime) => DateTime::<Utc>::from(mtime),
                    Err(e) => {
                        warn!("Skipping {}: no timestamp in name and no mtime ({})", name, e);
                        continue;
                    }
                },
            };

            refs.push(StoredArtifactRef {
                destination_key: self.key_for(&prefix, &name),
                created_at,
                size_bytes: metadata.len(),
            });
        }

        sort_oldest_first(&mut refs);
        Ok(refs)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let sidecar = self.path_for(&digest_key(key))?;
        match fs::remove_file(&sidecar).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove digest sidecar for {}: {}", key, e),
        }

        info!("Deleted {}", key);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}
