//! Azure Blob Storage destination
//!
//! Built on `object_store`, so the same code runs against a real container,
//! Azurite, or the in-memory store used in tests.

use super::progress::UploadObserver;
use super::{key_segments, sort_oldest_first, DestinationStore, Result, StorageError};
use crate::artifact::{
    database_prefix, digest_file_contents, digest_key, is_artifact_name, parse_artifact_timestamp,
    BackupArtifact, StoredArtifactRef,
};
use crate::config::CloudBlobSettings;
use crate::utils::hasher::Sha256Stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::path::Path as ObjectPath;
use object_store::{
    Error as ObjectStoreError, MultipartUpload, ObjectStore, ObjectStoreExt, PutMode, PutOptions,
    PutPayload, RetryConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Size of each uploaded block
const PART_SIZE: usize = 8 * 1024 * 1024;

pub struct BlobStore {
    store: Arc<dyn ObjectStore>,
    container: String,
    verify_uploads: bool,
    observer: Option<Arc<dyn UploadObserver>>,
}

impl BlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
            verify_uploads: true,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Disable re-reading uploaded blobs; `verify` then only checks existence
    pub fn with_verify_uploads(mut self, verify: bool) -> Self {
        self.verify_uploads = verify;
        self
    }

    /// Connect to the container described by the configuration
    ///
    /// Transient transport errors are retried by the client, up to
    /// `max_retries` times within `retry_timeout_seconds`.
    pub fn from_settings(
        settings: &CloudBlobSettings,
        observer: Option<Arc<dyn UploadObserver>>,
    ) -> Result<Self> {
        let connection = &settings.connection;
        let mut builder = MicrosoftAzureBuilder::new().with_container_name(&settings.container_name);

        if connection.use_emulator {
            builder = builder.with_use_emulator(true);
        }
        if let Some(account) = &connection.account {
            builder = builder.with_account(account);
        }
        if let Some(key) = &connection.access_key {
            builder = builder.with_access_key(key);
        }
        if let Some(sas) = &connection.sas_token {
            builder = builder.with_config(AzureConfigKey::SasKey, sas);
        }
        if let Some(endpoint) = &connection.blob_endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        builder = builder.with_retry(RetryConfig {
            max_retries: settings.max_retries,
            retry_timeout: Duration::from_secs(settings.retry_timeout_seconds),
            ..Default::default()
        });

        let store = builder.build().map_err(backend)?;

        if !settings.verify_uploads {
            warn!(
                "Upload verification disabled for container '{}'; stored bytes will not be re-hashed",
                settings.container_name
            );
        }

        Ok(Self {
            store: Arc::new(store),
            container: settings.container_name.clone(),
            verify_uploads: settings.verify_uploads,
            observer,
        })
    }

    fn location(key: &str) -> Result<ObjectPath> {
        key_segments(key)?;
        Ok(ObjectPath::from(key))
    }

    async fn exists(&self, location: &ObjectPath) -> Result<bool> {
        match self.store.head(location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    /// Upload a local file in fixed-size parts, reporting progress after each
    async fn upload_file(&self, artifact: &BackupArtifact, key: &str, location: &ObjectPath) -> Result<u64> {
        let mut file = tokio::fs::File::open(&artifact.local_path).await?;
        let total = file.metadata().await?.len();

        if let Some(observer) = &self.observer {
            observer.on_start(key, total);
        }

        let upload = self.store.put_multipart(location).await.map_err(backend)?;
        let mut upload = UploadGuard::new(upload, key);
        let mut sent = 0u64;

        let result: Result<()> = async {
            loop {
                let mut part = Vec::with_capacity(PART_SIZE);
                (&mut file).take(PART_SIZE as u64).read_to_end(&mut part).await?;
                if part.is_empty() {
                    break;
                }

                sent += part.len() as u64;
                upload.put_part(PutPayload::from(Bytes::from(part))).await?;

                if let Some(observer) = &self.observer {
                    observer.on_progress(key, sent, total);
                }
            }
            upload.complete().await
        }
        .await;

        if let Err(e) = result {
            upload.abort().await;
            return Err(e);
        }

        if let Some(observer) = &self.observer {
            observer.on_complete(key, sent);
        }

        Ok(sent)
    }
}

/// Multipart upload that is aborted unless it completes
///
/// Dropping it mid-upload (a cancelled run) spawns the abort on the current
/// runtime so no uncommitted blocks are left in the container.
struct UploadGuard {
    upload: Option<Box<dyn MultipartUpload>>,
    key: String,
}

impl UploadGuard {
    fn new(upload: Box<dyn MultipartUpload>, key: &str) -> Self {
        Self {
            upload: Some(upload),
            key: key.to_string(),
        }
    }

    fn finished(&self) -> StorageError {
        StorageError::Backend(format!("upload of {} already finished", self.key))
    }

    async fn put_part(&mut self, payload: PutPayload) -> Result<()> {
        match self.upload.as_mut() {
            Some(upload) => upload.put_part(payload).await.map_err(backend),
            None => Err(self.finished()),
        }
    }

    async fn complete(&mut self) -> Result<()> {
        let Some(upload) = self.upload.as_mut() else {
            return Err(self.finished());
        };
        upload.complete().await.map_err(backend)?;
        self.upload = None;
        Ok(())
    }

    async fn abort(&mut self) {
        if let Some(mut upload) = self.upload.take() {
            if let Err(e) = upload.abort().await {
                warn!("Failed to abort upload of {}: {}", self.key, e);
            }
        }
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        let Some(mut upload) = self.upload.take() else {
            return;
        };
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Aborting interrupted upload of {}", key);
                handle.spawn(async move {
                    if let Err(e) = upload.abort().await {
                        warn!("Failed to abort upload of {}: {}", key, e);
                    }
                });
            }
            Err(_) => warn!("Upload of {} interrupted outside a runtime; not aborted", key),
        }
    }
}

#[async_trait]
impl DestinationStore for BlobStore {
    async fn store(&self, artifact: &BackupArtifact) -> Result<String> {
        let digest = artifact.digest.as_deref().ok_or(StorageError::MissingDigest)?;
        let key = artifact.key();
        let location = Self::location(&key)?;

        // Block uploads can't be made conditional, so check first
        if self.exists(&location).await? {
            return Err(StorageError::AlreadyExists(key));
        }

        let sent = self.upload_file(artifact, &key, &location).await?;

        let sidecar = Self::location(&digest_key(&key))?;
        let contents = digest_file_contents(digest, &artifact.filename());
        let opts = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        match self
            .store
            .put_opts(&sidecar, PutPayload::from(Bytes::from(contents)), opts)
            .await
        {
            Ok(_) => {}
            Err(ObjectStoreError::AlreadyExists { .. }) => {
                return Err(StorageError::AlreadyExists(digest_key(&key)));
            }
            Err(e) => return Err(backend(e)),
        }

        info!(
            container = %self.container,
            key = %key,
            size_bytes = sent,
            "Uploaded artifact"
        );
        Ok(key)
    }

    async fn verify(&self, key: &str, digest: &str) -> Result<()> {
        let location = Self::location(key)?;

        if !self.verify_uploads {
            return match self.exists(&location).await? {
                true => Ok(()),
                false => Err(StorageError::NotFound(key.to_string())),
            };
        }

        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(backend(e)),
        };

        let mut hasher = Sha256Stream::new();
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.next().await {
            hasher.update(&chunk.map_err(backend)?);
        }

        let bytes = hasher.bytes();
        let actual = hasher.finish();
        if actual != digest {
            return Err(StorageError::DigestMismatch {
                key: key.to_string(),
                expected: digest.to_string(),
                actual,
            });
        }

        debug!("Verified {} ({} bytes, {})", key, bytes, digest);
        Ok(())
    }

    async fn list(&self, host: &str, database: &str) -> Result<Vec<StoredArtifactRef>> {
        let prefix = database_prefix(host, database);
        let prefix_path = Self::location(&prefix)?;

        let mut refs = Vec::new();
        let mut stream = self.store.list(Some(&prefix_path));

        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(backend)?;
            let name = match meta.location.filename() {
                Some(name) if is_artifact_name(name) => name.to_string(),
                _ => continue,
            };

            refs.push(StoredArtifactRef {
                destination_key: meta.location.to_string(),
                created_at: parse_artifact_timestamp(&name).unwrap_or(meta.last_modified),
                size_bytes: meta.size,
            });
        }

        sort_oldest_first(&mut refs);
        Ok(refs)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let location = Self::location(key)?;

        // Deleting a missing blob is not an error for every backend
        if !self.exists(&location).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.store.delete(&location).await.map_err(backend)?;

        let sidecar = Self::location(&digest_key(key))?;
        match self.store.delete(&sidecar).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => warn!("Failed to remove digest sidecar for {}: {}", key, e),
        }

        info!(container = %self.container, key = %key, "Deleted artifact");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("blob container {}", self.container)
    }
}

fn backend(err: ObjectStoreError) -> StorageError {
    StorageError::Backend(err.to_string())
}
