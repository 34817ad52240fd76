//! GitHub REST/GraphQL client used for permissions, comments, PR lookups,
//! and best-effort closing-issue enrichment.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::transport_helpers::{
    backoff_delay, retry_after_hint, should_retry_status, should_retry_transport,
};
use swe_core::truncate_for_log;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const ERROR_BODY_EXCERPT_CHARS: usize = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Canonical `owner/name` repository reference.
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid repository '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid repository '{raw}', expected owner/repo");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
/// Response to comment create/update calls.
pub struct CommentCreateResponse {
    pub id: u64,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
/// Subset of a pull request used by the append-path decision.
pub struct PullRequestDetails {
    pub state: String,
    pub head_ref: String,
    pub base_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Construction parameters for [`GithubApiClient`].
pub struct GithubApiClientConfig {
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for GithubApiClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: String::new(),
            request_timeout_ms: 10_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 250,
        }
    }
}

#[derive(Clone)]
/// Retrying GitHub client; repos are passed per call because the bridge
/// serves every repository that delivers events to it.
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay: Duration,
}

impl GithubApiClient {
    pub fn new(config: GithubApiClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(base_headers(&config.token)?)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("github http client construction failed")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms.max(1)),
        })
    }

    /// Collaborator permission level for `(repo, username)`:
    /// `admin` | `maintain` | `write` | `read` | `none`.
    pub async fn collaborator_permission(
        &self,
        repo: &RepoRef,
        username: &str,
    ) -> Result<String> {
        #[derive(Deserialize)]
        struct PermissionResponse {
            permission: String,
        }

        let response: PermissionResponse = self
            .call_json("collaborator permission", || {
                self.http.get(format!(
                    "{}/repos/{}/{}/collaborators/{}/permission",
                    self.api_base, repo.owner, repo.name, username
                ))
            })
            .await?;
        Ok(response.permission)
    }

    pub async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<CommentCreateResponse> {
        let payload = json!({ "body": body });
        self.call_json("create issue comment", || {
            self.http
                .post(format!(
                    "{}/repos/{}/{}/issues/{}/comments",
                    self.api_base, repo.owner, repo.name, issue_number
                ))
                .json(&payload)
        })
        .await
    }

    pub async fn update_issue_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> Result<CommentCreateResponse> {
        let payload = json!({ "body": body });
        self.call_json("update issue comment", || {
            self.http
                .patch(format!(
                    "{}/repos/{}/{}/issues/comments/{}",
                    self.api_base, repo.owner, repo.name, comment_id
                ))
                .json(&payload)
        })
        .await
    }

    pub async fn pull_request(
        &self,
        repo: &RepoRef,
        pr_number: u64,
    ) -> Result<PullRequestDetails> {
        #[derive(Deserialize)]
        struct BranchRef {
            #[serde(rename = "ref")]
            git_ref: String,
        }

        #[derive(Deserialize)]
        struct PullResponse {
            state: String,
            head: BranchRef,
            base: BranchRef,
        }

        let response: PullResponse = self
            .call_json("pull request details", || {
                self.http.get(format!(
                    "{}/repos/{}/{}/pulls/{}",
                    self.api_base, repo.owner, repo.name, pr_number
                ))
            })
            .await?;
        Ok(PullRequestDetails {
            state: response.state,
            head_ref: response.head.git_ref,
            base_ref: response.base.git_ref,
        })
    }

    /// Number of the first issue the PR closes, via GraphQL
    /// `closingIssuesReferences(first: 1)`. `Ok(None)` when the PR links no
    /// issue.
    pub async fn closing_issue_for_pr(
        &self,
        repo: &RepoRef,
        pr_number: u64,
    ) -> Result<Option<u64>> {
        let query = "query($owner: String!, $name: String!, $number: Int!) { \
                     repository(owner: $owner, name: $name) { \
                     pullRequest(number: $number) { \
                     closingIssuesReferences(first: 1) { nodes { number } } } } }";
        let payload = json!({
            "query": query,
            "variables": {
                "owner": repo.owner,
                "name": repo.name,
                "number": pr_number,
            },
        });

        let response: serde_json::Value = self
            .call_json("closing issues lookup", || {
                self.http
                    .post(format!("{}/graphql", self.api_base))
                    .json(&payload)
            })
            .await?;
        if let Some(errors) = response.get("errors").and_then(|value| value.as_array()) {
            if !errors.is_empty() {
                bail!(
                    "github graphql closing issues lookup failed: {}",
                    truncate_for_log(&errors[0].to_string(), 240)
                );
            }
        }
        Ok(response
            .pointer("/data/repository/pullRequest/closingIssuesReferences/nodes/0/number")
            .and_then(|value| value.as_u64()))
    }

    /// Best-effort enrichment under a hard deadline. Timeout, platform error,
    /// and empty result all collapse to `None`; the webhook path never waits
    /// past the deadline.
    pub async fn enrich_closing_issue(
        &self,
        repo: &RepoRef,
        pr_number: u64,
        deadline: Duration,
    ) -> Option<u64> {
        match tokio::time::timeout(deadline, self.closing_issue_for_pr(repo, pr_number)).await {
            Ok(Ok(issue_number)) => issue_number,
            Ok(Err(error)) => {
                tracing::warn!(
                    repo = %repo.as_slug(),
                    pr_number,
                    "closing-issue enrichment failed: {error:#}"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    repo = %repo.as_slug(),
                    pr_number,
                    "closing-issue enrichment timed out after {}ms",
                    deadline.as_millis()
                );
                None
            }
        }
    }

    /// Issue a request, decode JSON, and absorb transient failures.
    ///
    /// Rate-limit and 5xx responses wait out a Retry-After-aware pause and
    /// go again; everything else surfaces immediately with a bounded body
    /// excerpt.
    async fn call_json<T, F>(&self, what: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let attempts = self.retry_max_attempts;
        for attempt in 1..=attempts {
            let response = match build().send().await {
                Ok(response) => response,
                Err(error) if should_retry_transport(&error) && attempt < attempts => {
                    tokio::time::sleep(backoff_delay(self.retry_base_delay, attempt, None)).await;
                    continue;
                }
                Err(error) => {
                    return Err(error).with_context(|| format!("github {what} request failed"));
                }
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .with_context(|| format!("github {what} returned an undecodable body"));
            }

            let hint = retry_after_hint(response.headers());
            let excerpt = truncate_for_log(
                &response.text().await.unwrap_or_default(),
                ERROR_BODY_EXCERPT_CHARS,
            );
            if should_retry_status(status.as_u16()) && attempt < attempts {
                tokio::time::sleep(backoff_delay(self.retry_base_delay, attempt, hint)).await;
                continue;
            }
            bail!("github {what} returned {}: {excerpt}", status.as_u16());
        }
        bail!("github {what} exhausted its {attempts} attempts");
    }
}

fn base_headers(token: &str) -> Result<reqwest::header::HeaderMap> {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("swe-bridge"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert(
        HeaderName::from_static("x-github-api-version"),
        HeaderValue::from_static("2022-11-28"),
    );
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
        .context("platform token contains bytes not allowed in a header")?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::{GithubApiClient, GithubApiClientConfig, RepoRef};
    use std::time::Duration;

    #[test]
    fn unit_repo_ref_parse_accepts_owner_slash_name() {
        let repo = RepoRef::parse(" acme/repo ").expect("parse");
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "repo");
        assert_eq!(repo.as_slug(), "acme/repo");
    }

    #[test]
    fn regression_repo_ref_parse_rejects_malformed_slugs() {
        for raw in ["acme", "/repo", "acme/", "acme/extra/repo"] {
            assert!(RepoRef::parse(raw).is_err(), "expected rejection for {raw:?}");
        }
    }

    #[tokio::test]
    async fn regression_enrichment_deadline_yields_none_on_unreachable_host() {
        // A non-routable target forces the timeout branch; the enrichment
        // contract is that nothing escapes as an error.
        let client = GithubApiClient::new(GithubApiClientConfig {
            api_base: "http://192.0.2.1:9".to_string(),
            token: "test-token".to_string(),
            request_timeout_ms: 30_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        })
        .expect("client");
        let repo = RepoRef::parse("acme/repo").expect("repo");
        let started = std::time::Instant::now();
        let enriched = client
            .enrich_closing_issue(&repo, 456, Duration::from_millis(200))
            .await;
        assert_eq!(enriched, None);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
