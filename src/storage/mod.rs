//! Backup destinations
//!
//! Provides an abstraction over where artifacts are kept, so the orchestrator
//! works the same way against a local directory or a blob container.
//!
//! Every artifact lives under `<host>/<database>/<filename>` with a
//! `<filename>.sha256` sidecar next to it.

pub mod blob;
pub mod local;
pub mod progress;

use crate::artifact::{BackupArtifact, StoredArtifactRef};
use crate::config::DestinationConfig;
use crate::error::BackupError;
use async_trait::async_trait;
use std::sync::Arc;

pub use blob::BlobStore;
pub use local::LocalStore;
pub use progress::{LogProgress, UploadObserver};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("refusing to overwrite existing artifact '{0}'")]
    AlreadyExists(String),

    #[error("artifact '{0}' not found")]
    NotFound(String),

    #[error("invalid artifact key '{0}'")]
    InvalidKey(String),

    #[error("digest mismatch for '{key}': expected {expected}, stored bytes hash to {actual}")]
    DigestMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("artifact has no digest; hash it before storing")]
    MissingDigest,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob storage error: {0}")]
    Backend(String),
}

impl From<StorageError> for BackupError {
    fn from(err: StorageError) -> Self {
        BackupError::StorageFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Operations every destination provides
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Persist an artifact and its digest sidecar, returning the assigned key
    ///
    /// Fails with [`StorageError::AlreadyExists`] rather than overwriting.
    async fn store(&self, artifact: &BackupArtifact) -> Result<String>;

    /// Recompute the digest of the stored bytes and compare
    async fn verify(&self, key: &str, digest: &str) -> Result<()>;

    /// Artifacts held for one database, oldest first
    async fn list(&self, host: &str, database: &str) -> Result<Vec<StoredArtifactRef>>;

    /// Remove an artifact (and its sidecar)
    async fn delete(&self, key: &str) -> Result<()>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Closed set of supported destinations
pub enum Destination {
    Local(LocalStore),
    CloudBlob(BlobStore),
}

impl Destination {
    /// Build the destination named by the configuration
    pub fn from_config(
        config: &DestinationConfig,
        observer: Option<Arc<dyn UploadObserver>>,
    ) -> Result<Self> {
        match config {
            DestinationConfig::Local { backup_path } => {
                Ok(Destination::Local(LocalStore::new(backup_path.clone())))
            }
            DestinationConfig::CloudBlob(settings) => {
                Ok(Destination::CloudBlob(BlobStore::from_settings(settings, observer)?))
            }
        }
    }

    fn inner(&self) -> &dyn DestinationStore {
        match self {
            Destination::Local(store) => store,
            Destination::CloudBlob(store) => store,
        }
    }
}

#[async_trait]
impl DestinationStore for Destination {
    async fn store(&self, artifact: &BackupArtifact) -> Result<String> {
        self.inner().store(artifact).await
    }

    async fn verify(&self, key: &str, digest: &str) -> Result<()> {
        self.inner().verify(key, digest).await
    }

    async fn list(&self, host: &str, database: &str) -> Result<Vec<StoredArtifactRef>> {
        self.inner().list(host, database).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner().delete(key).await
    }

    fn describe(&self) -> String {
        self.inner().describe()
    }
}

/// Split a key into path segments, rejecting anything that could escape the root
pub(crate) fn key_segments(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key.split('/').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'))
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(segments)
}

/// Order artifacts oldest first, ties broken by key
pub(crate) fn sort_oldest_first(refs: &mut [StoredArtifactRef]) {
    refs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.destination_key.cmp(&b.destination_key))
    });
}
