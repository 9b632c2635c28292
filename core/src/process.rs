//! Subprocess execution
//!
//! Runs external commands with captured output, optional stdin, and a hard
//! timeout. The child is killed when the timeout elapses.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Process execution errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("I/O error while running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out.trim().to_string()
    }
}

/// Execute `command` with `args`, optionally feeding `stdin`
pub async fn run_command(
    command: &Path,
    args: &[&str],
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let command_display = command.display().to_string();
    let start_time = Instant::now();

    debug!("Executing command: {} with args: {:?}", command_display, args);

    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        command: command_display.clone(),
        source,
    })?;

    // stdin is fed while output is drained so neither pipe can fill up
    let pipe = child.stdin.take();
    let feed = async move {
        match (stdin, pipe) {
            (Some(input), Some(mut pipe)) => {
                pipe.write_all(input).await?;
                pipe.shutdown().await
            }
            _ => Ok(()),
        }
    };
    let run = async {
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        match fed {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("'{}' exited before reading all of its input", command_display);
            }
            Err(e) => return Err(e),
            Ok(()) => {}
        }
        Ok(output)
    };

    let output = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ProcessError::Io {
                command: command_display,
                source,
            })
        }
        Err(_) => {
            warn!("Command '{}' timed out after {:?}", command_display, timeout);
            return Err(ProcessError::TimedOut {
                command: command_display,
                timeout,
            });
        }
    };

    let result = ProcessOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start_time.elapsed().as_millis() as u64,
    };

    debug!(
        "Command '{}' exited with {:?} in {}ms",
        command_display, result.exit_code, result.duration_ms
    );
    Ok(result)
}
