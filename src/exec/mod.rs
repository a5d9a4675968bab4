//! Shell command execution.
//!
//! Everything hydractl knows about the outside world — node binaries, the
//! process table, lock files, the ledger CLI — it learns by running shell
//! commands. The `Executor` trait is the single seam: the supervisor and the
//! funds workflows are written against it, and tests swap in a scripted mock.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::ExecError;

#[cfg(test)]
pub mod mock;

/// Captured result of a completed command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Runs shell commands on behalf of the core.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `command` through the shell and wait for it to complete.
    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError>;

    /// Launch `command` as a fully detached background job with both output
    /// streams redirected to `log_file`. Returns as soon as the job is
    /// handed off to the shell; the job survives hydractl's own exit.
    async fn spawn_background(&self, command: &str, log_file: &Path) -> Result<(), ExecError>;
}

/// Executor backed by `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

#[async_trait]
impl Executor for ShellExecutor {
    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError> {
        debug!(command, "running shell command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ExecError::SpawnFailed {
                command: command.to_string(),
                source,
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        debug!(command, exit_code = result.exit_code, "shell command exited");
        Ok(result)
    }

    async fn spawn_background(&self, command: &str, log_file: &Path) -> Result<(), ExecError> {
        // The inner shell exits immediately after forking the job, which
        // reparents the job to init: it outlives hydractl.
        let wrapped = format!(
            "nohup {} >> {} 2>&1 < /dev/null &",
            command,
            shell_quote(&log_file.to_string_lossy())
        );
        debug!(command, log_file = %log_file.display(), "spawning detached background job");

        let status = Command::new("sh")
            .arg("-c")
            .arg(&wrapped)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| ExecError::SpawnFailed {
                command: command.to_string(),
                source,
            })?;

        if !status.success() {
            return Err(ExecError::SpawnFailed {
                command: command.to_string(),
                source: std::io::Error::other(format!(
                    "background shell exited with {}",
                    status.code().unwrap_or(-1)
                )),
            });
        }
        Ok(())
    }
}

/// Single-quote `value` for safe interpolation into an `sh -c` string.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
