//! Dump execution abstraction for testability
//!
//! A [`DumpExecutor`] runs one dump tool and streams its stdout through gzip
//! into an artifact file. [`ProcessExecutor`] spawns real subprocesses;
//! [`mock::MockExecutor`] records calls and fabricates output for tests.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

const READ_CHUNK: usize = 64 * 1024;
const STDERR_EXCERPT_CHARS: usize = 512;

/// A fully described dump tool invocation
#[derive(Clone, PartialEq, Eq)]
pub struct DumpCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment, used for credentials
    pub env: BTreeMap<String, String>,
    /// Database being dumped, for logging and mock lookup
    pub database: String,
}

impl fmt::Debug for DumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpCommand")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("database", &self.database)
            .finish()
    }
}

/// Byte counts of a finished dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DumpOutput {
    /// Bytes the tool wrote to stdout
    pub raw_bytes: u64,
    /// Bytes written to the artifact file
    pub compressed_bytes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("{0} not found on PATH")]
    ToolNotFound(String),

    #[error("dump tool exited with {exit_code:?}: {stderr}")]
    ToolFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("dump produced no output")]
    EmptyOutput,

    #[error("dump timed out after {0:?}")]
    TimedOut(Duration),

    #[error("I/O error during dump: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DumpError> for crate::error::BackupError {
    fn from(err: DumpError) -> Self {
        let exit_code = match &err {
            DumpError::ToolFailed { exit_code, .. } => *exit_code,
            DumpError::EmptyOutput => Some(0),
            _ => None,
        };
        let stderr_excerpt = match err {
            DumpError::ToolFailed { stderr, .. } => stderr,
            other => other.to_string(),
        };
        crate::error::BackupError::DumpFailed {
            exit_code,
            stderr_excerpt,
        }
    }
}

/// Runs a dump tool, writing gzip-compressed stdout to `output`
#[async_trait]
pub trait DumpExecutor: Send + Sync {
    async fn run(
        &self,
        command: &DumpCommand,
        output: &Path,
        timeout: Duration,
    ) -> Result<DumpOutput, DumpError>;
}

/// Default implementation using real subprocesses
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DumpExecutor for ProcessExecutor {
    async fn run(
        &self,
        command: &DumpCommand,
        output: &Path,
        timeout: Duration,
    ) -> Result<DumpOutput, DumpError> {
        let program = which::which(&command.program)
            .map_err(|_| DumpError::ToolNotFound(command.program.clone()))?;

        debug!(
            "Running dump: {} {}",
            program.display(),
            command.args.join(" ")
        );

        let mut child = Command::new(&program)
            .args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("dump tool stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("dump tool stderr not captured"))?;

        let result = tokio::time::timeout(timeout, async {
            let (counts, stderr) =
                tokio::join!(compress_to_file(stdout, output), read_all(stderr));
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((counts?, stderr?, status))
        })
        .await;

        let (counts, stderr, status) = match result {
            Ok(finished) => finished?,
            Err(_) => {
                warn!("Dump of {} timed out after {:?}", command.database, timeout);
                let _ = child.kill().await;
                return Err(DumpError::TimedOut(timeout));
            }
        };

        if !status.success() {
            return Err(DumpError::ToolFailed {
                exit_code: status.code(),
                stderr: stderr_excerpt(&stderr),
            });
        }

        if !stderr.is_empty() {
            debug!("Dump stderr: {}", String::from_utf8_lossy(&stderr).trim());
        }

        Ok(counts)
    }
}

/// Stream a reader through gzip into `path`
async fn compress_to_file<R>(mut reader: R, path: &Path) -> std::io::Result<DumpOutput>
where
    R: AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut encoder = GzEncoder::new(Vec::with_capacity(READ_CHUNK), Compression::default());
    let mut buf = vec![0u8; READ_CHUNK];
    let mut counts = DumpOutput::default();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        counts.raw_bytes += n as u64;
        encoder.write_all(&buf[..n])?;

        let pending = std::mem::take(encoder.get_mut());
        if !pending.is_empty() {
            counts.compressed_bytes += pending.len() as u64;
            file.write_all(&pending).await?;
        }
    }

    let tail = encoder.finish()?;
    counts.compressed_bytes += tail.len() as u64;
    file.write_all(&tail).await?;
    file.flush().await?;
    file.sync_all().await?;

    Ok(counts)
}

async fn read_all<R>(mut reader: R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Last few hundred characters of stderr, where tools put the actual error
pub fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_EXCERPT_CHARS {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - STDERR_EXCERPT_CHARS).collect();
    format!("...{}", tail)
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Recorded dump invocation
    #[derive(Clone, Debug)]
    pub struct DumpCall {
        pub command: DumpCommand,
        pub output: PathBuf,
    }

    /// Behaviour of a mocked dump, keyed by database name
    #[derive(Clone, Debug)]
    pub enum MockDump {
        /// Tool succeeds and writes these bytes to stdout
        Output(Vec<u8>),
        /// Tool succeeds without writing anything
        Empty,
        /// Tool exits non-zero
        Failure { exit_code: i32, stderr: String },
        /// Tool writes some output, then exits non-zero
        PartialThenFail { output: Vec<u8>, exit_code: i32 },
        /// Tool never finishes
        Hang,
    }

    impl Default for MockDump {
        fn default() -> Self {
            MockDump::Output(b"-- mock dump\n".to_vec())
        }
    }

    /// Mock executor for testing
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded invocations
        pub calls: Arc<Mutex<Vec<DumpCall>>>,
        responses: Arc<Mutex<HashMap<String, MockDump>>>,
        default_response: Arc<Mutex<MockDump>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure the dump result for a specific database
        pub fn expect(self, database: &str, response: MockDump) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(database.to_string(), response);
            self
        }

        /// Set the result for databases without a specific response
        pub fn with_default_response(self, response: MockDump) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        pub fn get_calls(&self) -> Vec<DumpCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn was_called(&self, database: &str) -> bool {
            self.call_count(database) > 0
        }

        pub fn call_count(&self, database: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.command.database == database)
                .count()
        }

        fn response_for(&self, database: &str) -> MockDump {
            self.responses
                .lock()
                .unwrap()
                .get(database)
                .cloned()
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }

        async fn write_gzip(output: &Path, data: &[u8]) -> Result<DumpOutput, DumpError> {
            compress_to_file(data, output).await.map_err(DumpError::from)
        }
    }

    #[async_trait]
    impl DumpExecutor for MockExecutor {
        async fn run(
            &self,
            command: &DumpCommand,
            output: &Path,
            timeout: Duration,
        ) -> Result<DumpOutput, DumpError> {
            self.calls.lock().unwrap().push(DumpCall {
                command: command.clone(),
                output: output.to_path_buf(),
            });

            match self.response_for(&command.database) {
                MockDump::Output(data) => Self::write_gzip(output, &data).await,
                MockDump::Empty => Self::write_gzip(output, &[]).await,
                MockDump::Failure { exit_code, stderr } => Err(DumpError::ToolFailed {
                    exit_code: Some(exit_code),
                    stderr,
                }),
                MockDump::PartialThenFail { output: data, exit_code } => {
                    Self::write_gzip(output, &data).await?;
                    Err(DumpError::ToolFailed {
                        exit_code: Some(exit_code),
                        stderr: "connection lost".to_string(),
                    })
                }
                MockDump::Hang => {
                    tokio::time::sleep(timeout).await;
                    Err(DumpError::TimedOut(timeout))
                }
            }
        }
    }
}
