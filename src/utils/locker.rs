//! File-based locking to prevent concurrent runs of the same configuration

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Advisory lock file for one configuration
pub struct RunLock {
    lock: RwLock<File>,
    lock_path: PathBuf,
}

/// Held for as long as the run lasts
pub struct RunLockGuard<'a> {
    _guard: RwLockWriteGuard<'a, File>,
    lock_path: &'a Path,
}

impl RunLock {
    /// Open (creating if needed) the lock file for a configuration
    pub fn open(temp_dir: &Path, config_path: &Path) -> Result<Self> {
        let lock_path = Self::lock_path(temp_dir, config_path);

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create lock directory")?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .context(format!("Failed to open lock file: {:?}", lock_path))?;

        Ok(Self {
            lock: RwLock::new(file),
            lock_path,
        })
    }

    /// Take the lock without waiting
    /// Returns error if another run of the same configuration holds it
    pub fn try_acquire(&mut self) -> Result<RunLockGuard<'_>> {
        debug!("Attempting to acquire lock: {:?}", self.lock_path);

        let guard = self.lock.try_write().context(format!(
            "Another backup run is in progress for this configuration (lock held: {:?})",
            self.lock_path
        ))?;

        info!("Acquired run lock: {:?}", self.lock_path);

        Ok(RunLockGuard {
            _guard: guard,
            lock_path: &self.lock_path,
        })
    }

    /// `<temp_dir>/safedb-<config stem>-<path hash>.lock`
    ///
    /// The hash is taken over the canonical config path, so same-named
    /// configs in different directories get separate locks.
    pub fn lock_path(temp_dir: &Path, config_path: &Path) -> PathBuf {
        let stem = config_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "default".to_string());

        let canonical = config_path
            .canonicalize()
            .or_else(|_| std::path::absolute(config_path))
            .unwrap_or_else(|_| config_path.to_path_buf());
        let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
        let tag = &hex::encode(digest)[..12];

        temp_dir.join(format!("safedb-{}-{}.lock", stem, tag))
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RunLockGuard<'_> {
    fn drop(&mut self) {
        info!("Released run lock: {:?}", self.lock_path);
    }
}
