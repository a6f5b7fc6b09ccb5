//! Access to the machine being scanned: PATH lookups and subprocesses.
//!
//! Strategies never call `which` or spawn processes directly; they go through
//! a [`Host`]. [`SystemHost`] is the real implementation, tests substitute a
//! scripted one.

use crate::detection::find_executable;
use crate::{DetectionError, Platform};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Whether the process exited successfully.
    pub success: bool,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr, like a shell's `2>&1`.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Turn a non-zero exit into [`DetectionError::CommandFailed`].
    pub fn require_success(self, program: &str) -> Result<Self, DetectionError> {
        if self.success {
            Ok(self)
        } else {
            Err(DetectionError::CommandFailed {
                program: program.to_string(),
                code: self.code,
            })
        }
    }
}

/// Platform abstraction used by every detection strategy.
#[async_trait]
pub trait Host: Send + Sync {
    /// The operating system being scanned.
    fn platform(&self) -> Platform {
        Platform::current()
    }

    /// Resolve an executable name to a full path. Must not spawn processes.
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    /// Resolve symlinks in `path`, if it exists.
    fn canonicalize(&self, path: &Path) -> Option<PathBuf> {
        std::fs::canonicalize(path).ok()
    }

    /// Run `program` with `args` and capture its output.
    ///
    /// A non-zero exit is returned as `Ok` with `success == false`; errors are
    /// reserved for failing to run the program at all, timeouts and
    /// cancellation. Implementations must kill the child process when the
    /// token is cancelled.
    async fn run(
        &self,
        cancel: &CancellationToken,
        program: &Path,
        args: &[String],
    ) -> Result<CommandOutput, DetectionError>;
}

/// The real machine: `which`-based lookup and tokio subprocesses.
#[derive(Debug, Clone)]
pub struct SystemHost {
    command_timeout: Duration,
}

impl SystemHost {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new(crate::DetectOptions::default().command_timeout)
    }
}

#[async_trait]
impl Host for SystemHost {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        find_executable(name)
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        program: &Path,
        args: &[String],
    ) -> Result<CommandOutput, DetectionError> {
        let program_name = program.display().to_string();
        if cancel.is_cancelled() {
            return Err(DetectionError::Cancelled);
        }

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    DetectionError::PermissionDenied {
                        program: program_name.clone(),
                    }
                } else {
                    DetectionError::Io {
                        program: program_name.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        let output = tokio::select! {
            result = child.wait_with_output() => result.map_err(|e| DetectionError::Io {
                program: program_name.clone(),
                message: e.to_string(),
            })?,
            () = tokio::time::sleep(self.command_timeout) => {
                tracing::debug!(program = %program_name, "command timed out");
                return Err(DetectionError::Timeout {
                    program: program_name,
                    timeout: self.command_timeout,
                });
            }
            () = cancel.cancelled() => {
                tracing::debug!(program = %program_name, "command cancelled");
                return Err(DetectionError::Cancelled);
            }
        };

        Ok(CommandOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
