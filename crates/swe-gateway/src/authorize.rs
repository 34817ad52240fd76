//! Poster authorization against the platform permission API.

use swe_github::{GithubApiClient, RepoRef};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Escape hatches that bypass the permission lookup entirely.
pub struct AuthorizerConfig {
    pub allow_all_users: bool,
    pub permission_mode_open: bool,
}

impl AuthorizerConfig {
    pub fn bypasses_check(self) -> bool {
        self.allow_all_users || self.permission_mode_open
    }
}

/// Grant on write-level permission (`admin`, `maintain`, `write`).
///
/// A failing permission API grants access (fail-open): availability wins
/// when the platform is flaky, and every such grant is logged.
pub async fn authorize_actor(
    client: &GithubApiClient,
    repo: &RepoRef,
    username: &str,
    config: AuthorizerConfig,
) -> bool {
    if config.bypasses_check() {
        return true;
    }
    match client.collaborator_permission(repo, username).await {
        Ok(permission) => {
            let granted = is_write_level(&permission);
            if !granted {
                tracing::info!(
                    repo = %repo.as_slug(),
                    username,
                    permission,
                    "actor lacks write permission"
                );
            }
            granted
        }
        Err(error) => {
            tracing::warn!(
                repo = %repo.as_slug(),
                username,
                "permission lookup failed, allowing (fail-open): {error:#}"
            );
            true
        }
    }
}

fn is_write_level(permission: &str) -> bool {
    matches!(permission, "admin" | "maintain" | "write")
}
