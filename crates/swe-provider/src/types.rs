use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Hard wall-clock limit applied when the caller supplies no deadline.
pub const DEFAULT_PROVIDER_DEADLINE: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported provider adapters.
pub enum ProviderKind {
    Claude,
    Codex,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "codex" => Ok(Self::Codex),
            other => Err(ProviderError::InvalidConfig(format!(
                "unknown provider '{other}', expected claude or codex"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One code-generation invocation against a checked-out working tree.
pub struct GenerateRequest {
    pub prompt: String,
    pub workdir: PathBuf,
    /// Wall-clock limit; `None` applies [`DEFAULT_PROVIDER_DEADLINE`].
    pub deadline: Option<Duration>,
    /// Credentials and pass-through context. Environment only; secrets never
    /// enter argv.
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Aggregated provider output, used for logging and the tracking comment.
pub struct GenerateOutcome {
    pub summary: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Error)]
/// Enumerates supported `ProviderError` values.
pub enum ProviderError {
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to spawn provider '{executable}': {message}")]
    Spawn { executable: String, message: String },
    #[error("provider timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("provider exited with status {status} after {elapsed_ms}ms: {summary}")]
    Failed {
        status: String,
        elapsed_ms: u64,
        summary: String,
    },
    #[error("provider io failure: {0}")]
    Io(String),
}

#[async_trait]
/// Trait contract for provider adapter behavior.
pub trait ProviderClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate_code(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateOutcome, ProviderError>;
}
