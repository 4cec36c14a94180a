//! Backup artifacts and their naming scheme
//!
//! Artifacts are named `<engine>_<database>_<YYYYmmddTHHMMSSZ>.sql.gz` and
//! stored under `<host>/<database>/<filename>`. The creation time can always
//! be recovered from the filename, which keeps retention independent of
//! whatever metadata a destination happens to preserve.

use crate::config::DatabaseEngine;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

pub const ARTIFACT_EXTENSION: &str = ".sql.gz";
pub const DIGEST_EXTENSION: &str = ".sha256";

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A dump produced for one database during a run
#[derive(Debug, Clone)]
pub struct BackupArtifact {
    pub database_name: String,
    pub engine: DatabaseEngine,
    pub host: String,
    pub created_at: DateTime<Utc>,
    /// Location inside the target's scratch directory; gone once the run moves on
    pub local_path: PathBuf,
    pub size_bytes: u64,
    /// SHA-256 hex digest, set once the artifact has been hashed
    pub digest: Option<String>,
    /// Assigned by the destination when the artifact is stored
    pub destination_key: Option<String>,
}

impl BackupArtifact {
    pub fn filename(&self) -> String {
        artifact_filename(self.engine, &self.database_name, self.created_at)
    }

    /// Key under which this artifact lives in any destination
    pub fn key(&self) -> String {
        artifact_key(&self.host, &self.database_name, &self.filename())
    }
}

/// What a destination reports about an artifact it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifactRef {
    pub destination_key: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Build the artifact filename for a database dump taken at `created_at`
pub fn artifact_filename(engine: DatabaseEngine, database: &str, created_at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}{}",
        engine.as_str(),
        sanitize_segment(database),
        created_at.format(TIMESTAMP_FORMAT),
        ARTIFACT_EXTENSION
    )
}

/// Recover the creation time encoded in an artifact filename
pub fn parse_artifact_timestamp(filename: &str) -> Option<DateTime<Utc>> {
    let stem = filename.strip_suffix(ARTIFACT_EXTENSION)?;
    let (_, timestamp) = stem.rsplit_once('_')?;
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// `<host>/<database>` prefix shared by all artifacts of one database
pub fn database_prefix(host: &str, database: &str) -> String {
    format!("{}/{}", sanitize_segment(host), sanitize_segment(database))
}

pub fn artifact_key(host: &str, database: &str, filename: &str) -> String {
    format!("{}/{}", database_prefix(host, database), filename)
}

/// Key of the digest sidecar stored next to an artifact
pub fn digest_key(artifact_key: &str) -> String {
    format!("{}{}", artifact_key, DIGEST_EXTENSION)
}

pub fn is_artifact_name(name: &str) -> bool {
    name.ends_with(ARTIFACT_EXTENSION)
}

/// Contents of a sidecar file, in `sha256sum` format
pub fn digest_file_contents(digest: &str, filename: &str) -> String {
    format!("{}  {}\n", digest, filename)
}

/// Make a value safe to use as a single path segment
pub fn sanitize_segment(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
