//! Test fixtures and sample data
//!
//! Provides config templates, fake dump tools and helpers for inspecting
//! stored artifacts.

use chrono::{DateTime, Duration, Utc};
use flate2::read::GzDecoder;
use safedb::artifact::StoredArtifactRef;
use std::io::Read;
use std::path::{Path, PathBuf};

/// A plausible SQL dump of `lines` statements
pub fn sample_dump(lines: usize) -> Vec<u8> {
    let mut out = b"-- safedb test dump\nCREATE TABLE items (id INT PRIMARY KEY, name TEXT);\n".to_vec();
    for i in 0..lines {
        out.extend_from_slice(format!("INSERT INTO items VALUES ({}, 'item-{}');\n", i, i).as_bytes());
    }
    out
}

/// Stored artifact reference `age_days` old relative to `now`
pub fn stored_ref(key: &str, now: DateTime<Utc>, age_days: i64) -> StoredArtifactRef {
    StoredArtifactRef {
        destination_key: key.to_string(),
        created_at: now - Duration::days(age_days),
        size_bytes: 128,
    }
}

/// Decompress a stored artifact
pub fn gunzip_file(path: &Path) -> Vec<u8> {
    let file = std::fs::File::open(path).expect("Failed to open artifact");
    gunzip(file)
}

pub fn gunzip<R: Read>(reader: R) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(reader)
        .read_to_end(&mut out)
        .expect("Artifact is not valid gzip");
    out
}

/// All `.sql.gz` files below a directory, sorted
pub fn find_artifacts(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.to_string_lossy().ends_with(".sql.gz") {
                found.push(path);
            }
        }
    }

    found.sort();
    found
}

/// Write an executable shell script standing in for a dump tool
#[cfg(unix)]
pub fn write_fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).expect("Failed to create tool dir");
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make fake tool executable");
    path
}

/// Fake dump tool that prints a fixed dump to stdout
#[cfg(unix)]
pub fn fake_dump_tool(dir: &Path, name: &str) -> PathBuf {
    write_fake_tool(
        dir,
        name,
        "echo '-- fake dump'\necho 'CREATE TABLE t (id INT);'\necho 'INSERT INTO t VALUES (1);'",
    )
}

/// Fake dump tool that leaves a marker file behind when it runs
#[cfg(unix)]
pub fn marker_tool(dir: &Path, name: &str, marker: &Path) -> PathBuf {
    write_fake_tool(
        dir,
        name,
        &format!("touch '{}'\necho '-- dump'", marker.display()),
    )
}

/// Minimal valid config TOML template
///
/// Placeholders: `{backup_path}`, `{log_dir}`, `{temp_dir}`
pub fn minimal_config_toml() -> &'static str {
    r#"
[general]
databases = ["shop"]
destination = "local"
retention_days = 7
default_db_type = "mariadb"
temp_dir = "{temp_dir}"
log_directory = "{log_dir}"

[mariadb]
host = "localhost"
user = "backup"
password = "secret"

[local]
backup_path = "{backup_path}"
"#
}

/// Config mixing every engine, an unsupported one and a per-database override
pub fn multi_engine_config_toml() -> &'static str {
    r#"
[general]
databases = ["shop", "analytics", "erp", "legacy"]
destination = "local"
retention_days = 14
default_db_type = "mariadb"
parallelism = 2
temp_dir = "{temp_dir}"
log_directory = "{log_dir}"

[mariadb]
host = "maria.internal"
user = "backup"
extra_params = ["--single-transaction"]

[postgresql]
host = "pg.internal"
user = "postgres"

[mssql]
host = "sql.internal"
port = 14330
user = "sa"

[databases.analytics]
type = "postgresql"

[databases.erp]
type = "sqlserver"

[databases.legacy]
type = "oracle"
host = "ora.internal"
user = "system"

[local]
backup_path = "{backup_path}"
"#
}

/// Cloud blob config pointing at the local emulator
pub fn cloud_blob_config_toml() -> &'static str {
    r#"
[general]
databases = ["shop"]
destination = "AzureBlob"
retention_days = 30
temp_dir = "{temp_dir}"
log_directory = "{log_dir}"

[mariadb]
host = "localhost"
user = "backup"

[cloud_blob]
connection_string = "UseDevelopmentStorage=true"
container_name = "backups"
"#
}

/// Fill `{placeholder}` values in a template
pub fn render(template: &str, values: &[(&str, &Path)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), &value.display().to_string())
    })
}
