//! HTTP surface: webhook intake, liveness, and read-only task routes.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use swe_store::TaskStore;

use crate::pipeline::{WebhookOutcome, WebhookPipeline};

/// Shared handler state.
pub struct GatewayState {
    pub pipeline: WebhookPipeline,
    pub store: Arc<TaskStore>,
}

pub fn build_gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(handle_health))
        .route("/api/tasks", get(handle_tasks_list))
        .route("/api/tasks/{id}", get(handle_task_detail))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn run_gateway_server(state: Arc<GatewayState>, port: u16) -> Result<()> {
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind webhook server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound webhook server address")?;
    tracing::info!("webhook server listening: addr={local_addr}");

    axum::serve(listener, build_gateway_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("webhook server exited unexpectedly")
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_webhook(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = header_value(&headers, "x-hub-signature-256");
    let event_name = header_value(&headers, "x-github-event");
    let outcome = state.pipeline.process(&event_name, &signature, &body).await;
    match outcome {
        WebhookOutcome::Queued { .. } => (StatusCode::ACCEPTED, "Task queued").into_response(),
        WebhookOutcome::Ignored { reason } => (StatusCode::OK, reason).into_response(),
        WebhookOutcome::Rejected { reason } => (StatusCode::BAD_REQUEST, reason).into_response(),
        WebhookOutcome::Unauthorized => {
            (StatusCode::UNAUTHORIZED, "invalid signature").into_response()
        }
        WebhookOutcome::Busy { closed: false } => {
            (StatusCode::SERVICE_UNAVAILABLE, "queue full").into_response()
        }
        WebhookOutcome::Busy { closed: true } => {
            (StatusCode::SERVICE_UNAVAILABLE, "queue closed").into_response()
        }
        WebhookOutcome::Error { reason } => {
            tracing::error!("webhook pipeline error: {reason}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

async fn handle_tasks_list(State(state): State<Arc<GatewayState>>) -> Response {
    match state.store.list() {
        Ok(tasks) => Json(tasks).into_response(),
        Err(error) => {
            tracing::error!("task list query failed: {error:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

async fn handle_task_detail(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get(&id) {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "task not found").into_response(),
        Err(error) => {
            tracing::error!("task detail query failed: {error:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{build_gateway_router, GatewayState};
    use crate::authorize::AuthorizerConfig;
    use crate::pipeline::{PipelineConfig, WebhookPipeline};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use swe_dispatch::{Dispatcher, DispatcherConfig, RunDisposition, TaskRunner};
    use swe_executor::{Executor, ExecutorConfig};
    use swe_github::{GithubApiClient, GithubApiClientConfig, InstallationTokenSource, Task};
    use swe_provider::{ClaudeCliClient, ClaudeCliConfig};
    use swe_store::{now_rfc3339, LogEntry, LogLevel, StoredTask, TaskStatus, TaskStore};
    use tokio::net::TcpListener;

    struct NoopRunner;

    #[async_trait]
    impl TaskRunner for NoopRunner {
        async fn run(&self, _task: &Task) -> RunDisposition {
            RunDisposition::Completed
        }

        async fn abandon(&self, _task: &Task, _reason: &str) {}
    }

    async fn spawn_gateway(store: Arc<TaskStore>) -> (String, Dispatcher) {
        let github = Arc::new(
            GithubApiClient::new(GithubApiClientConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                token: "test-token".to_string(),
                request_timeout_ms: 250,
                retry_max_attempts: 1,
                retry_base_delay_ms: 1,
            })
            .expect("client"),
        );
        let dispatcher = Dispatcher::new(DispatcherConfig::default(), Arc::new(NoopRunner));
        let provider =
            Arc::new(ClaudeCliClient::new(ClaudeCliConfig::default()).expect("provider"));
        let executor = Arc::new(Executor::new(
            ExecutorConfig::default(),
            provider,
            Arc::clone(&github),
            Arc::clone(&store),
            InstallationTokenSource::Static("test-token".to_string()),
        ));
        let pipeline = WebhookPipeline::new(
            PipelineConfig {
                webhook_secret: "topsecret".to_string(),
                trigger: "/code".to_string(),
                enrichment_deadline: Duration::from_millis(200),
                authorizer: AuthorizerConfig::default(),
            },
            github,
            Arc::clone(&store),
            dispatcher.handle(),
            executor,
        );
        let state = Arc::new(GatewayState { pipeline, store });
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, build_gateway_router(state))
                .await
                .expect("serve");
        });
        (format!("http://{addr}"), dispatcher)
    }

    fn stored(id: &str) -> StoredTask {
        let now = now_rfc3339();
        StoredTask {
            id: id.to_string(),
            title: "fix typo".to_string(),
            status: TaskStatus::Completed,
            repo_owner: "acme".to_string(),
            repo_name: "repo".to_string(),
            issue_number: 123,
            actor: "octocat".to_string(),
            created_at: now.clone(),
            updated_at: now,
            logs: vec![LogEntry {
                timestamp: now_rfc3339(),
                level: LogLevel::Success,
                message: "task completed".to_string(),
            }],
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn integration_health_and_task_routes_serve_the_store() {
        let store = Arc::new(TaskStore::open_in_memory().expect("store"));
        store.create(&stored("task-1")).expect("seed");
        let (base, dispatcher) = spawn_gateway(Arc::clone(&store)).await;
        let http = reqwest::Client::new();

        let health = http
            .get(format!("{base}/health"))
            .send()
            .await
            .expect("health");
        assert_eq!(health.status().as_u16(), 200);

        let list = http
            .get(format!("{base}/api/tasks"))
            .send()
            .await
            .expect("list");
        assert_eq!(list.status().as_u16(), 200);
        let body: serde_json::Value = list.json().await.expect("json");
        assert_eq!(body.as_array().map(|rows| rows.len()), Some(1));
        // The list route must not hydrate logs.
        assert_eq!(body[0]["logs"].as_array().map(|logs| logs.len()), Some(0));

        let detail = http
            .get(format!("{base}/api/tasks/task-1"))
            .send()
            .await
            .expect("detail");
        assert_eq!(detail.status().as_u16(), 200);
        let body: serde_json::Value = detail.json().await.expect("json");
        assert_eq!(body["status"], "completed");
        assert_eq!(body["logs"][0]["level"], "success");

        let missing = http
            .get(format!("{base}/api/tasks/nope"))
            .send()
            .await
            .expect("missing");
        assert_eq!(missing.status().as_u16(), 404);
        dispatcher.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn integration_webhook_route_maps_outcomes_to_status_codes() {
        let store = Arc::new(TaskStore::open_in_memory().expect("store"));
        let (base, dispatcher) = spawn_gateway(store).await;
        let http = reqwest::Client::new();

        // Bad signature → 401 with an opaque body.
        let unauthorized = http
            .post(format!("{base}/webhook"))
            .header("x-github-event", "issue_comment")
            .header("x-hub-signature-256", "sha256=deadbeef")
            .body("{}")
            .send()
            .await
            .expect("post");
        assert_eq!(unauthorized.status().as_u16(), 401);

        // Missing signature header behaves the same way.
        let missing_header = http
            .post(format!("{base}/webhook"))
            .header("x-github-event", "issue_comment")
            .body("{}")
            .send()
            .await
            .expect("post");
        assert_eq!(missing_header.status().as_u16(), 401);
        dispatcher.shutdown().await;
    }
}
