//! Upload progress reporting

use tracing::{debug, info};

/// Receives progress of a single artifact upload
#[cfg_attr(test, mockall::automock)]
pub trait UploadObserver: Send + Sync {
    fn on_start(&self, key: &str, total_bytes: u64);

    fn on_progress(&self, key: &str, sent_bytes: u64, total_bytes: u64);

    fn on_complete(&self, key: &str, total_bytes: u64);
}

/// Observer that reports progress through tracing
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl UploadObserver for LogProgress {
    fn on_start(&self, key: &str, total_bytes: u64) {
        info!("Uploading {} ({} bytes)", key, total_bytes);
    }

    fn on_progress(&self, key: &str, sent_bytes: u64, total_bytes: u64) {
        let percent = if total_bytes == 0 {
            100
        } else {
            sent_bytes * 100 / total_bytes
        };
        debug!("Upload {}: {}% ({}/{} bytes)", key, percent, sent_bytes, total_bytes);
    }

    fn on_complete(&self, key: &str, total_bytes: u64) {
        info!("Upload of {} complete ({} bytes)", key, total_bytes);
    }
}
