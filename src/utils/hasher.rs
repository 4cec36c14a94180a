//! Streaming SHA-256 digests for artifacts

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// Hex-encoded SHA-256 of a file, read in fixed-size chunks
pub async fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256Stream::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finish())
}

/// Incremental hasher for bytes that arrive in pieces (e.g. a blob download)
#[derive(Default)]
pub struct Sha256Stream {
    inner: Sha256,
    bytes: u64,
}

impl Sha256Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes hashed so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}
