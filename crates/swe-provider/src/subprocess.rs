//! Shared subprocess plumbing for the CLI adapters.

use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::types::ProviderError;

const MAX_TEXT_FILE_BUSY_RETRIES: u32 = 5;
const TEXT_FILE_BUSY_ERRNO: i32 = 26;
const FAILURE_SUMMARY_MAX_CHARS: usize = 800;

pub(crate) struct CompletedProcess {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) elapsed_ms: u64,
}

/// Spawn, optionally feed stdin, enforce the deadline, and collect output.
///
/// `kill_on_drop` terminates the child when the timeout branch drops the
/// wait future, so a hung tool cannot outlive its task.
pub(crate) async fn run_with_deadline(
    mut command: Command,
    executable: &str,
    deadline: Duration,
    stdin_payload: Option<&str>,
) -> Result<CompletedProcess, ProviderError> {
    let started = Instant::now();
    let mut child = spawn_with_text_file_busy_retry(&mut command, executable).await?;
    if let Some(payload) = stdin_payload {
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|error| ProviderError::Io(format!("failed to write prompt: {error}")))?;
        }
    }

    let remaining = deadline.saturating_sub(started.elapsed());
    let output = tokio::time::timeout(remaining, child.wait_with_output())
        .await
        .map_err(|_| ProviderError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        })?
        .map_err(|error| ProviderError::Io(format!("provider process failed: {error}")))?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        let status = output
            .status
            .code()
            .map(|value| value.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(ProviderError::Failed {
            status,
            elapsed_ms,
            summary: summarize_process_failure(&stderr, &stdout),
        });
    }

    Ok(CompletedProcess {
        stdout,
        stderr,
        elapsed_ms,
    })
}

/// A freshly written executable can race exec with ETXTBSY; retry briefly.
async fn spawn_with_text_file_busy_retry(
    command: &mut Command,
    executable: &str,
) -> Result<tokio::process::Child, ProviderError> {
    for attempt in 0..=MAX_TEXT_FILE_BUSY_RETRIES {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(error) => {
                if error.raw_os_error() == Some(TEXT_FILE_BUSY_ERRNO)
                    && attempt < MAX_TEXT_FILE_BUSY_RETRIES
                {
                    tokio::time::sleep(Duration::from_millis(25)).await;
                    continue;
                }
                return Err(ProviderError::Spawn {
                    executable: executable.to_string(),
                    message: error.to_string(),
                });
            }
        }
    }

    Err(ProviderError::Spawn {
        executable: executable.to_string(),
        message: "unknown error".to_string(),
    })
}

/// Stderr-first summary; the tail of the stream carries the actual error.
pub(crate) fn summarize_process_failure(stderr: &str, stdout: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return swe_core::truncate_head_tail(stderr, FAILURE_SUMMARY_MAX_CHARS);
    }

    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return swe_core::truncate_head_tail(stdout, FAILURE_SUMMARY_MAX_CHARS);
    }

    "no error output".to_string()
}
