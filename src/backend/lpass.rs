//! lpass subprocess runner
//!
//! Spawns the LastPass CLI directly (no shell), pipes request text into its
//! stdin and collects stdout/stderr. Field blocks written to stdin carry
//! secrets, so only the argument vector is ever logged.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::{classify_failure, BackendError, Runner};
use crate::config::LpassConfig;

/// Runner that executes the real lpass binary
pub struct LpassRunner {
    /// Path to lpass binary
    binary: PathBuf,
    /// Optional limit on a single invocation
    timeout: Option<Duration>,
}

impl LpassRunner {
    pub fn new(config: &LpassConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T, BackendError>
    where
        F: std::future::Future<Output = std::io::Result<T>>,
    {
        match self.timeout {
            Some(limit) => match timeout(limit, fut).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(BackendError::Timeout {
                    timeout_secs: limit.as_secs(),
                }),
            },
            None => Ok(fut.await?),
        }
    }
}

#[async_trait]
impl Runner for LpassRunner {
    async fn run(&self, stdin: &str, args: &[&str]) -> Result<String, BackendError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            binary = %self.binary.display(),
            args = ?args,
            "executing lpass command"
        );

        let mut child = cmd.spawn()?;

        if let Some(mut pipe) = child.stdin.take() {
            // a command that exits without reading stdin reports its own failure below
            if let Err(e) = pipe.write_all(stdin.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
            drop(pipe); // EOF
        }

        let output = self.bounded(child.wait_with_output()).await?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            // lpass terminates its output with exactly one newline
            let stdout = stdout.strip_suffix('\n').unwrap_or(&*stdout);
            Ok(stdout.to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let err = classify_failure(args, output.status.to_string(), &stderr);
            tracing::debug!(args = ?args, error = %err, "lpass command failed");
            Err(err)
        }
    }

    async fn run_interactive(&self, args: &[&str]) -> Result<(), BackendError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        tracing::debug!(
            binary = %self.binary.display(),
            args = ?args,
            "executing interactive lpass command"
        );

        let mut child = cmd.spawn()?;
        let status = self.bounded(child.wait()).await?;

        if status.success() {
            Ok(())
        } else {
            Err(BackendError::CommandFailed {
                command: args.first().unwrap_or(&"").to_string(),
                status: status.to_string(),
                stderr: String::new(),
            })
        }
    }
}
