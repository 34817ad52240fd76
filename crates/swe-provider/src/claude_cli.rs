use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::output::aggregate_structured_lines;
use crate::subprocess::run_with_deadline;
use crate::types::{
    GenerateOutcome, GenerateRequest, ProviderClient, ProviderError, DEFAULT_PROVIDER_DEADLINE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeCliConfig {
    pub executable: String,
    /// Model argv value; empty omits the flag and lets the CLI pick.
    pub model: String,
    pub extra_args: Vec<String>,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            executable: "claude".to_string(),
            model: String::new(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeCliClient {
    config: ClaudeCliConfig,
}

impl ClaudeCliClient {
    pub fn new(config: ClaudeCliConfig) -> Result<Self, ProviderError> {
        if config.executable.trim().is_empty() {
            return Err(ProviderError::InvalidConfig(
                "claude cli executable is empty".to_string(),
            ));
        }
        Ok(Self { config })
    }
}

#[async_trait]
impl ProviderClient for ClaudeCliClient {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn generate_code(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateOutcome, ProviderError> {
        let mut command = Command::new(&self.config.executable);
        command.kill_on_drop(true);
        command.current_dir(&request.workdir);
        command.arg("-p");
        command.arg(&request.prompt);
        command.arg("--output-format");
        command.arg("stream-json");
        command.arg("--verbose");
        if !self.config.model.trim().is_empty() {
            command.arg("--model");
            command.arg(&self.config.model);
        }
        command.arg("--dangerously-skip-permissions");
        command.args(&self.config.extra_args);
        command.envs(&request.env);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let deadline = request.deadline.unwrap_or(DEFAULT_PROVIDER_DEADLINE);
        let completed =
            run_with_deadline(command, &self.config.executable, deadline, None).await?;
        if !completed.stderr.trim().is_empty() {
            tracing::debug!(
                "claude cli stderr: {}",
                swe_core::truncate_for_log(completed.stderr.trim(), 400)
            );
        }

        Ok(GenerateOutcome {
            summary: aggregate_structured_lines(&completed.stdout),
            elapsed_ms: completed.elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use tempfile::tempdir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn test_request(workdir: &Path) -> GenerateRequest {
        let mut env = BTreeMap::new();
        env.insert("ANTHROPIC_API_KEY".to_string(), "sk-test".to_string());
        GenerateRequest {
            prompt: "fix the typo".to_string(),
            workdir: workdir.to_path_buf(),
            deadline: Some(Duration::from_secs(10)),
            env,
        }
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let script = dir.join(name);
        let content = format!("#!/bin/sh\nset -eu\n{body}\n");
        std::fs::write(&script, content).expect("write script");
        let mut perms = std::fs::metadata(&script)
            .expect("script metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod script");
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn integration_claude_cli_client_aggregates_stream_json_lines() {
        let dir = tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "mock-claude.sh",
            r#"
if [ "$1" != "-p" ]; then
  echo "expected -p argument" >&2
  exit 11
fi
shift 2
fmt=""
model=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output-format) shift; fmt="$1";;
    --model) shift; model="$1";;
  esac
  shift
done
if [ "$fmt" != "stream-json" ]; then
  echo "expected stream-json output format" >&2
  exit 12
fi
if [ "$model" != "claude-test-model" ]; then
  echo "expected model argument" >&2
  exit 13
fi
if [ "$ANTHROPIC_API_KEY" != "sk-test" ]; then
  echo "expected api key in environment" >&2
  exit 14
fi
printf '{"type":"assistant","message":{"content":[{"type":"text","text":"typo fixed"}]}}\n'
printf '{"type":"result","message":"run complete"}\n'
"#,
        );
        let client = ClaudeCliClient::new(ClaudeCliConfig {
            executable: script.display().to_string(),
            model: "claude-test-model".to_string(),
            extra_args: vec![],
        })
        .expect("build client");

        let outcome = client
            .generate_code(test_request(dir.path()))
            .await
            .expect("generation");
        assert_eq!(outcome.summary, "typo fixed\nrun complete");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn functional_claude_cli_client_falls_back_to_plain_stdout() {
        let dir = tempdir().expect("tempdir");
        let script = write_script(dir.path(), "mock-claude.sh", r#"printf "plain claude stdout""#);
        let client = ClaudeCliClient::new(ClaudeCliConfig {
            executable: script.display().to_string(),
            model: String::new(),
            extra_args: vec![],
        })
        .expect("build client");

        let outcome = client
            .generate_code(test_request(dir.path()))
            .await
            .expect("generation");
        assert_eq!(outcome.summary, "plain claude stdout");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn regression_claude_cli_client_reports_non_zero_exit() {
        let dir = tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "mock-claude.sh",
            r#"
echo "claude auth failed" >&2
exit 42
"#,
        );
        let client = ClaudeCliClient::new(ClaudeCliConfig {
            executable: script.display().to_string(),
            model: String::new(),
            extra_args: vec![],
        })
        .expect("build client");

        let error = client
            .generate_code(test_request(dir.path()))
            .await
            .expect_err("expected failure");
        assert!(error.to_string().contains("status 42"));
        assert!(error.to_string().contains("claude auth failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn regression_claude_cli_client_reports_timeout_with_elapsed() {
        let dir = tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "mock-claude.sh",
            r#"
sleep 2
printf '{"message":"late"}'
"#,
        );
        let client = ClaudeCliClient::new(ClaudeCliConfig {
            executable: script.display().to_string(),
            model: String::new(),
            extra_args: vec![],
        })
        .expect("build client");

        let mut request = test_request(dir.path());
        request.deadline = Some(Duration::from_millis(50));
        let error = client
            .generate_code(request)
            .await
            .expect_err("timeout should fail");
        assert!(matches!(error, ProviderError::Timeout { .. }));
        assert!(error.to_string().contains("timed out"));
    }

    #[test]
    fn unit_claude_cli_client_rejects_blank_executable() {
        let error = ClaudeCliClient::new(ClaudeCliConfig {
            executable: "  ".to_string(),
            model: String::new(),
            extra_args: vec![],
        })
        .expect_err("blank executable");
        assert!(error.to_string().contains("executable is empty"));
    }
}
