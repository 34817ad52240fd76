use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::output::aggregate_structured_lines;
use crate::subprocess::run_with_deadline;
use crate::types::{
    GenerateOutcome, GenerateRequest, ProviderClient, ProviderError, DEFAULT_PROVIDER_DEADLINE,
};

const DEFAULT_EXEC_ARGS: &[&str] = &[
    "exec",
    "--full-auto",
    "--skip-git-repo-check",
    "--color",
    "never",
    "--json",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexCliConfig {
    pub executable: String,
    /// Model argv value; empty omits the flag and lets the CLI pick.
    pub model: String,
    /// Rendered as `-c model_reasoning_effort=<value>` when set.
    pub reasoning_effort: Option<String>,
    pub extra_args: Vec<String>,
}

impl Default for CodexCliConfig {
    fn default() -> Self {
        Self {
            executable: "codex".to_string(),
            model: String::new(),
            reasoning_effort: None,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexCliClient {
    config: CodexCliConfig,
}

impl CodexCliClient {
    pub fn new(config: CodexCliConfig) -> Result<Self, ProviderError> {
        if config.executable.trim().is_empty() {
            return Err(ProviderError::InvalidConfig(
                "codex cli executable is empty".to_string(),
            ));
        }
        Ok(Self { config })
    }
}

#[async_trait]
impl ProviderClient for CodexCliClient {
    fn name(&self) -> &'static str {
        "codex"
    }

    async fn generate_code(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateOutcome, ProviderError> {
        let mut command = Command::new(&self.config.executable);
        command.kill_on_drop(true);
        command.current_dir(&request.workdir);
        command.args(DEFAULT_EXEC_ARGS);
        if !self.config.model.trim().is_empty() {
            command.arg("--model");
            command.arg(&self.config.model);
        }
        if let Some(effort) = &self.config.reasoning_effort {
            command.arg("-c");
            command.arg(format!("model_reasoning_effort={effort}"));
        }
        command.arg("--cd");
        command.arg(&request.workdir);
        command.args(&self.config.extra_args);
        command.arg("-");
        command.envs(&request.env);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let deadline = request.deadline.unwrap_or(DEFAULT_PROVIDER_DEADLINE);
        let completed = run_with_deadline(
            command,
            &self.config.executable,
            deadline,
            Some(&request.prompt),
        )
        .await?;
        if !completed.stderr.trim().is_empty() {
            tracing::debug!(
                "codex cli stderr: {}",
                swe_core::truncate_for_log(completed.stderr.trim(), 400)
            );
        }

        Ok(GenerateOutcome {
            summary: aggregate_structured_lines(&completed.stdout),
            elapsed_ms: completed.elapsed_ms,
        })
    }
}
