//! Common utilities for integration tests
//!
//! This module provides cleanup guards and helper functions for integration tests.

use anyhow::Result;
use safedb::commands::{self, BackupDeps};
use safedb::report::RunReport;
use safedb::utils::executor::ProcessExecutor;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use test_utils::TestContext;
use tokio_util::sync::CancellationToken;

/// Guard that ensures Docker container cleanup on drop (even on panic)
pub struct ContainerGuard {
    name: String,
}

impl ContainerGuard {
    pub fn new(name: String) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        cleanup_container(&self.name);
    }
}

/// Helper to stop and remove a Docker container
/// The -v flag also removes anonymous volumes associated with the container
fn cleanup_container(name: &str) {
    let _ = Command::new("docker").args(["stop", name]).output();
    let _ = Command::new("docker").args(["rm", "-v", name]).output();
}

/// Helper to check if Docker is available
pub fn is_docker_available() -> bool {
    Command::new("docker")
        .args(["ps"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Unique container name per test process
pub fn container_name(prefix: &str) -> String {
    format!("safedb-test-{}-{}", prefix, std::process::id())
}

/// Start a detached container
pub fn start_container(name: &str, env: &[&str], image: &str) -> Result<ContainerGuard> {
    let mut args = vec!["run", "-d", "--name", name];
    for var in env {
        args.push("-e");
        args.push(var);
    }
    args.push(image);

    let output = Command::new("docker").args(&args).output()?;
    if !output.status.success() {
        anyhow::bail!(
            "docker run failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(ContainerGuard::new(name.to_string()))
}

/// Poll a readiness command inside the container
pub fn wait_until_ready(container: &str, check: &[&str]) -> Result<()> {
    for _ in 0..60 {
        let mut args = vec!["exec", container];
        args.extend_from_slice(check);

        let ready = Command::new("docker")
            .args(&args)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if ready {
            return Ok(());
        }

        thread::sleep(Duration::from_secs(1));
    }

    Err(anyhow::anyhow!("{} failed to become ready", container))
}

/// Run a command inside the container and return its stdout
pub fn docker_exec(container: &str, args: &[&str]) -> Result<String> {
    let mut full = vec!["exec", container];
    full.extend_from_slice(args);

    let output = Command::new("docker").args(&full).output()?;
    if !output.status.success() {
        anyhow::bail!(
            "docker exec failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Wrapper script that runs a dump tool inside the container
///
/// `password_var` is forwarded from the caller's environment so credentials
/// travel the same way they would to a local tool.
#[cfg(unix)]
pub fn container_tool(dir: &Path, container: &str, tool: &str, password_var: &str) -> PathBuf {
    test_utils::write_fake_tool(
        dir,
        tool,
        &format!(
            "exec docker exec -i -e {} {} {} \"$@\"",
            password_var, container, tool
        ),
    )
}

/// Run the backup command with the real process executor
pub async fn run_backup(ctx: &TestContext) -> Result<RunReport> {
    commands::backup(
        ctx.config().unwrap(),
        ctx.config_path().unwrap(),
        None,
        BackupDeps {
            executor: Arc::new(ProcessExecutor::new()),
            observer: None,
            cancel: CancellationToken::new(),
        },
    )
    .await
}
