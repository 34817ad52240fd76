//! Environment configuration, parsed once at startup.
//!
//! Absent keys fall back to documented defaults; unparseable numeric values
//! are a startup error rather than a silent default.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use swe_core::{env_bool, env_string, env_u64, env_usize};
use swe_dispatch::{DispatcherConfig, RetryPolicy};
use swe_gateway::AuthorizerConfig;
use swe_github::InstallationTokenSource;
use swe_provider::{ClaudeCliConfig, CodexCliConfig, ProviderKind, ProviderSettings};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TRIGGER: &str = "/code";
pub const DEFAULT_DB_PATH: &str = "./data/tasks.db";

#[derive(Debug, Clone)]
/// Fully-parsed bridge configuration.
pub struct BridgeConfig {
    pub port: u16,
    pub trigger: String,
    pub webhook_secret: String,
    pub github_api_base: String,
    pub platform_base_url: String,
    pub store_path: PathBuf,
    pub dispatcher: DispatcherConfig,
    pub authorizer: AuthorizerConfig,
    pub provider: ProviderSettings,
    pub git_author_name: String,
    pub git_author_email: String,
    pub token_source: InstallationTokenSource,
    /// Credentials forwarded into the provider subprocess environment.
    pub provider_env: BTreeMap<String, String>,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        let webhook_secret = env_string("GITHUB_WEBHOOK_SECRET", "");
        if webhook_secret.is_empty() {
            bail!("GITHUB_WEBHOOK_SECRET must be set");
        }

        let port = env_u64("PORT", DEFAULT_PORT as u64)?;
        let port = u16::try_from(port).context("PORT must fit in 0..=65535")?;

        let retry = RetryPolicy {
            base_delay: Duration::from_secs(env_u64("DISPATCHER_RETRY_SECONDS", 15)?),
            multiplier: env_u64("DISPATCHER_BACKOFF_MULTIPLIER", 2)?,
            max_delay: Duration::from_secs(env_u64("DISPATCHER_RETRY_MAX_SECONDS", 300)?),
            max_attempts: env_usize("DISPATCHER_MAX_ATTEMPTS", 3)?,
        };
        let dispatcher = DispatcherConfig {
            workers: env_usize("DISPATCHER_WORKERS", 4)?,
            queue_capacity: env_usize("DISPATCHER_QUEUE_SIZE", 16)?,
            retry,
        };

        let provider_kind = ProviderKind::parse(&env_string("PROVIDER", "claude"))
            .map_err(|error| anyhow::anyhow!("{error}"))?;
        let provider = ProviderSettings {
            kind: provider_kind,
            claude: ClaudeCliConfig {
                executable: env_string("CLAUDE_EXECUTABLE", "claude"),
                model: env_string("CLAUDE_MODEL", ""),
                extra_args: Vec::new(),
            },
            codex: CodexCliConfig {
                executable: env_string("CODEX_EXECUTABLE", "codex"),
                model: env_string("CODEX_MODEL", ""),
                reasoning_effort: non_empty(env_string("CODEX_REASONING_EFFORT", "")),
                extra_args: Vec::new(),
            },
        };

        let authorizer = AuthorizerConfig {
            allow_all_users: env_bool("ALLOW_ALL_USERS", false),
            permission_mode_open: env_string("PERMISSION_MODE", "")
                .eq_ignore_ascii_case("open"),
        };

        // A static token wins; otherwise tokens are minted via the platform
        // CLI, which also owns App-key exchange (GITHUB_APP_ID and
        // GITHUB_PRIVATE_KEY ride in its inherited environment).
        let token_source = match non_empty(env_string("GITHUB_TOKEN", "")) {
            Some(token) => InstallationTokenSource::Static(token),
            None => InstallationTokenSource::Cli {
                executable: env_string("GH_CLI_PATH", "gh"),
            },
        };

        let mut provider_env = BTreeMap::new();
        for key in ["ANTHROPIC_API_KEY", "OPENAI_API_KEY", "OPENAI_BASE_URL"] {
            if let Some(value) = non_empty(env_string(key, "")) {
                provider_env.insert(key.to_string(), value);
            }
        }

        Ok(Self {
            port,
            trigger: env_string("TRIGGER_KEYWORD", DEFAULT_TRIGGER),
            webhook_secret,
            github_api_base: env_string("GITHUB_API_BASE", "https://api.github.com"),
            platform_base_url: env_string("GITHUB_BASE_URL", "https://github.com"),
            store_path: PathBuf::from(env_string("TASKSTORE_DB_PATH", DEFAULT_DB_PATH)),
            dispatcher,
            authorizer,
            provider,
            git_author_name: env_string("SWE_AGENT_GIT_NAME", "swe-agent"),
            git_author_email: env_string(
                "SWE_AGENT_GIT_EMAIL",
                "swe-agent@users.noreply.github.com",
            ),
            token_source,
            provider_env,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::BridgeConfig;
    use std::sync::Mutex;
    use std::time::Duration;
    use swe_provider::ProviderKind;

    // Env vars are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_bridge_env() {
        for key in [
            "GITHUB_WEBHOOK_SECRET",
            "PORT",
            "TRIGGER_KEYWORD",
            "PROVIDER",
            "DISPATCHER_WORKERS",
            "DISPATCHER_QUEUE_SIZE",
            "DISPATCHER_MAX_ATTEMPTS",
            "DISPATCHER_RETRY_SECONDS",
            "DISPATCHER_RETRY_MAX_SECONDS",
            "DISPATCHER_BACKOFF_MULTIPLIER",
            "TASKSTORE_DB_PATH",
            "ALLOW_ALL_USERS",
            "PERMISSION_MODE",
            "SWE_AGENT_GIT_NAME",
            "SWE_AGENT_GIT_EMAIL",
            "GITHUB_TOKEN",
            "GH_CLI_PATH",
            "ANTHROPIC_API_KEY",
            "CLAUDE_MODEL",
            "CLAUDE_EXECUTABLE",
            "OPENAI_API_KEY",
            "OPENAI_BASE_URL",
            "CODEX_MODEL",
            "CODEX_EXECUTABLE",
            "CODEX_REASONING_EFFORT",
            "GITHUB_API_BASE",
            "GITHUB_BASE_URL",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn functional_defaults_apply_when_only_the_secret_is_set() {
        let _lock = ENV_LOCK.lock().expect("env lock");
        clear_bridge_env();
        std::env::set_var("GITHUB_WEBHOOK_SECRET", "topsecret");

        let config = BridgeConfig::from_env().expect("config");
        assert_eq!(config.port, 8000);
        assert_eq!(config.trigger, "/code");
        assert_eq!(config.dispatcher.workers, 4);
        assert_eq!(config.dispatcher.queue_capacity, 16);
        assert_eq!(config.dispatcher.retry.max_attempts, 3);
        assert_eq!(config.dispatcher.retry.base_delay, Duration::from_secs(15));
        assert_eq!(config.dispatcher.retry.max_delay, Duration::from_secs(300));
        assert_eq!(config.dispatcher.retry.multiplier, 2);
        assert_eq!(config.provider.kind, ProviderKind::Claude);
        assert_eq!(config.store_path.to_string_lossy(), "./data/tasks.db");
        assert!(!config.authorizer.allow_all_users);
        assert!(matches!(
            config.token_source,
            swe_github::InstallationTokenSource::Cli { .. }
        ));
    }

    #[test]
    fn functional_env_overrides_are_honored() {
        let _lock = ENV_LOCK.lock().expect("env lock");
        clear_bridge_env();
        std::env::set_var("GITHUB_WEBHOOK_SECRET", "topsecret");
        std::env::set_var("PORT", "9102");
        std::env::set_var("PROVIDER", "codex");
        std::env::set_var("CODEX_MODEL", "gpt-test");
        std::env::set_var("TRIGGER_KEYWORD", "/agent");
        std::env::set_var("DISPATCHER_WORKERS", "2");
        std::env::set_var("DISPATCHER_QUEUE_SIZE", "5");
        std::env::set_var("ALLOW_ALL_USERS", "true");
        std::env::set_var("GITHUB_TOKEN", "ghs_static");
        std::env::set_var("ANTHROPIC_API_KEY", "sk-ant");

        let config = BridgeConfig::from_env().expect("config");
        assert_eq!(config.port, 9102);
        assert_eq!(config.provider.kind, ProviderKind::Codex);
        assert_eq!(config.provider.codex.model, "gpt-test");
        assert_eq!(config.trigger, "/agent");
        assert_eq!(config.dispatcher.workers, 2);
        assert_eq!(config.dispatcher.queue_capacity, 5);
        assert!(config.authorizer.allow_all_users);
        assert_eq!(
            config.token_source,
            swe_github::InstallationTokenSource::Static("ghs_static".to_string())
        );
        assert_eq!(
            config.provider_env.get("ANTHROPIC_API_KEY").map(String::as_str),
            Some("sk-ant")
        );
    }

    #[test]
    fn regression_missing_secret_and_bad_numbers_fail_startup() {
        let _lock = ENV_LOCK.lock().expect("env lock");
        clear_bridge_env();
        assert!(BridgeConfig::from_env().is_err());

        std::env::set_var("GITHUB_WEBHOOK_SECRET", "topsecret");
        std::env::set_var("DISPATCHER_WORKERS", "not-a-number");
        assert!(BridgeConfig::from_env().is_err());
        std::env::remove_var("DISPATCHER_WORKERS");

        std::env::set_var("PORT", "70000");
        assert!(BridgeConfig::from_env().is_err());
        std::env::remove_var("PORT");

        std::env::set_var("PROVIDER", "gemini");
        assert!(BridgeConfig::from_env().is_err());
        std::env::remove_var("PROVIDER");
    }
}
