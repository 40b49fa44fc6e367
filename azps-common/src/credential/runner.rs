//! Process execution for the credential.
//!
//! [`CommandRunner`] is the seam between the credential's decision logic and
//! the operating system. [`ProcessRunner`] is the real implementation; tests
//! substitute scripted runners.

use super::command::{CommandLine, Platform};
use super::process_group;
use crate::errors::SYSTEMROOT_NOT_SET;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Working directory used on Unix hosts.
pub const UNIX_SAFE_WORKING_DIR: &str = "/bin";

/// Errors that prevent a process from producing a result.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process {} did not exit within {}s and was killed", .pid.map_or_else(|| "?".to_string(), |p| p.to_string()), .timeout.as_secs_f64())]
    TimedOut { pid: Option<u32>, timeout: Duration },

    #[error("No safe working directory: {0}")]
    WorkingDirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exit status and captured streams of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a command to completion within a timeout.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        command: &CommandLine,
        timeout: Duration,
    ) -> impl Future<Output = Result<ProcessOutput, RunError>> + Send;
}

/// Spawns real processes from a safe working directory.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    platform: Platform,
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            working_dir: None,
        }
    }

    /// Pin the working directory instead of deriving it from the platform.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn resolve_working_dir(&self) -> Result<PathBuf, RunError> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => safe_working_dir(self.platform, std::env::var_os("SYSTEMROOT")),
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

/// Directory the child runs in; never the caller's current directory, so a
/// same-named executable planted there cannot be picked up.
pub fn safe_working_dir(
    platform: Platform,
    systemroot: Option<std::ffi::OsString>,
) -> Result<PathBuf, RunError> {
    match platform {
        Platform::Windows => match systemroot {
            Some(root) if !root.is_empty() => Ok(PathBuf::from(root)),
            _ => Err(RunError::WorkingDirectory(SYSTEMROOT_NOT_SET.to_string())),
        },
        Platform::Unix => Ok(PathBuf::from(UNIX_SAFE_WORKING_DIR)),
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &CommandLine,
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        let working_dir = self.resolve_working_dir()?;
        debug!(
            "Running {} in {} (timeout {:?})",
            command,
            working_dir.display(),
            timeout
        );

        let mut builder = Command::new(command.program());
        builder
            .args(command.args())
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The shell leads its own group so PowerShell can be killed with it.
        #[cfg(unix)]
        builder.process_group(0);

        let mut child = builder.spawn().map_err(|source| RunError::Spawn {
            program: command.program().to_string(),
            source,
        })?;

        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = tokio::time::timeout(timeout, async {
            let wait = async {
                let status = child.wait().await?;
                // Descendants that outlive the shell still hold the pipes open.
                if let Some(pid) = pid
                    && let Err(e) = process_group::kill_process_group(pid)
                {
                    debug!("Failed to clean up process group {}: {}", pid, e);
                }
                Ok::<_, std::io::Error>(status)
            };
            tokio::try_join!(wait, read_stream(stdout), read_stream(stderr))
        })
        .await;

        match outcome {
            Ok(result) => {
                let (status, stdout, stderr) = result?;
                debug!("Process {:?} exited with {}", pid, status);
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    stdout,
                    stderr,
                })
            }
            Err(_) => {
                warn!("Process {:?} exceeded {:?}; killing it", pid, timeout);
                if let Some(pid) = pid
                    && let Err(e) = process_group::kill_tree(pid).await
                {
                    warn!("Failed to kill process tree {}: {}", pid, e);
                }
                // Reaps the shell; it is usually gone already.
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill process {:?}: {}", pid, e);
                }
                Err(RunError::TimedOut { pid, timeout })
            }
        }
    }
}
