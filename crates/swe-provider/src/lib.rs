//! AI coding tool adapters.
//!
//! Each provider is an opaque CLI subprocess: the bridge hands it a composed
//! prompt and a working tree, enforces a wall-clock deadline, and aggregates
//! its structured output into a compact summary used only for logging.

mod claude_cli;
mod codex_cli;
mod output;
mod subprocess;
mod types;

pub use claude_cli::{ClaudeCliClient, ClaudeCliConfig};
pub use codex_cli::{CodexCliClient, CodexCliConfig};
pub use types::{
    GenerateOutcome, GenerateRequest, ProviderClient, ProviderError, ProviderKind,
    DEFAULT_PROVIDER_DEADLINE,
};

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Everything needed to construct whichever provider the env selects.
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub claude: ClaudeCliConfig,
    pub codex: CodexCliConfig,
}

/// Build the configured provider. Adding a provider is a new variant here,
/// not a cross-cutting change.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn ProviderClient>, ProviderError> {
    match settings.kind {
        ProviderKind::Claude => Ok(Arc::new(ClaudeCliClient::new(settings.claude.clone())?)),
        ProviderKind::Codex => Ok(Arc::new(CodexCliClient::new(settings.codex.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_provider, ClaudeCliConfig, CodexCliConfig, ProviderKind, ProviderSettings};

    fn settings(kind: ProviderKind) -> ProviderSettings {
        ProviderSettings {
            kind,
            claude: ClaudeCliConfig::default(),
            codex: CodexCliConfig::default(),
        }
    }

    #[test]
    fn unit_build_provider_selects_by_kind() {
        let claude = build_provider(&settings(ProviderKind::Claude)).expect("claude");
        assert_eq!(claude.name(), "claude");
        let codex = build_provider(&settings(ProviderKind::Codex)).expect("codex");
        assert_eq!(codex.name(), "codex");
    }

    #[test]
    fn unit_provider_kind_parses_known_names() {
        assert_eq!(ProviderKind::parse("claude").expect("claude"), ProviderKind::Claude);
        assert_eq!(ProviderKind::parse("CODEX").expect("codex"), ProviderKind::Codex);
        assert!(ProviderKind::parse("gemini").is_err());
    }
}
