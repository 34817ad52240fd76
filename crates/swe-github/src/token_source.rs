//! Short-lived installation token acquisition.
//!
//! App-key to installation-token exchange stays behind the platform CLI
//! boundary; the bridge either carries a static token from the environment
//! or mints one by invoking the CLI.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

const CLI_TOKEN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported installation token sources.
pub enum InstallationTokenSource {
    /// Token supplied directly via the environment.
    Static(String),
    /// Token minted by the platform CLI (`gh auth token`).
    Cli { executable: String },
}

impl InstallationTokenSource {
    pub async fn token(&self) -> Result<String> {
        match self {
            Self::Static(token) => {
                if token.trim().is_empty() {
                    bail!("static installation token is empty");
                }
                Ok(token.trim().to_string())
            }
            Self::Cli { executable } => mint_cli_token(executable).await,
        }
    }
}

async fn mint_cli_token(executable: &str) -> Result<String> {
    let mut command = Command::new(executable);
    command.kill_on_drop(true);
    command.arg("auth");
    command.arg("token");
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let child = command
        .spawn()
        .with_context(|| format!("failed to spawn platform cli '{executable}'"))?;
    let output = tokio::time::timeout(CLI_TOKEN_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "platform cli token mint timed out after {}s",
                CLI_TOKEN_TIMEOUT.as_secs()
            )
        })?
        .with_context(|| format!("platform cli '{executable}' failed"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "platform cli token mint failed with status {}: {}",
            output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            swe_core::truncate_for_log(stderr.trim(), 240)
        );
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        bail!("platform cli returned an empty token");
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::InstallationTokenSource;

    #[tokio::test]
    async fn unit_static_source_returns_trimmed_token() {
        let source = InstallationTokenSource::Static(" ghs_token ".to_string());
        assert_eq!(source.token().await.expect("token"), "ghs_token");
    }

    #[tokio::test]
    async fn regression_static_source_rejects_empty_token() {
        let source = InstallationTokenSource::Static("  ".to_string());
        assert!(source.token().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn integration_cli_source_reads_stdout_token() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("mock-gh.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nset -eu\n[ \"$1\" = auth ] && [ \"$2\" = token ]\nprintf 'ghs_minted\\n'\n",
        )
        .expect("write script");
        let mut perms = std::fs::metadata(&script).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod");

        let source = InstallationTokenSource::Cli {
            executable: script.display().to_string(),
        };
        assert_eq!(source.token().await.expect("token"), "ghs_minted");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn regression_cli_source_surfaces_nonzero_exit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("mock-gh-fail.sh");
        std::fs::write(&script, "#!/bin/sh\necho 'not logged in' >&2\nexit 4\n")
            .expect("write script");
        let mut perms = std::fs::metadata(&script).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod");

        let source = InstallationTokenSource::Cli {
            executable: script.display().to_string(),
        };
        let error = source.token().await.expect_err("expected failure");
        assert!(error.to_string().contains("status 4"));
        assert!(error.to_string().contains("not logged in"));
    }
}
