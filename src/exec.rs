use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Captured output of a `buffered` run.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn stderr_trimmed(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs external commands, primarily the kubectl CLI.
///
/// Exit codes are returned as values so callers decide how to treat non-zero
/// results; an error means the process could not be run at all.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs the command and captures stdout/stderr.
    async fn buffered(&self, program: &str, args: &[String]) -> Result<ExecResult>;

    /// Runs the command with stdout/stderr attached to this process's streams
    /// and returns the exit code.
    async fn standard(&self, program: &str, args: &[String]) -> Result<i32>;
}

/// Executor backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonExecutor;

#[async_trait]
impl Executor for CommonExecutor {
    async fn buffered(&self, program: &str, args: &[String]) -> Result<ExecResult> {
        debug!("running (buffered): {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| Error::Exec {
                program: program.to_string(),
                source,
            })?;

        Ok(ExecResult {
            code: output.status.code().unwrap_or(1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    async fn standard(&self, program: &str, args: &[String]) -> Result<i32> {
        debug!("running: {} {}", program, args.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|source| Error::Exec {
                program: program.to_string(),
                source,
            })?;

        Ok(status.code().unwrap_or(1))
    }
}
