//! swe-agent: webhook bridge between a code-hosting platform and external
//! AI coding CLIs.

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use swe_dispatch::Dispatcher;
use swe_executor::{Executor, ExecutorConfig};
use swe_gateway::{
    run_gateway_server, GatewayState, PipelineConfig, WebhookPipeline,
    DEFAULT_ENRICHMENT_DEADLINE,
};
use swe_github::{GithubApiClient, GithubApiClientConfig};
use swe_provider::build_provider;
use swe_store::TaskStore;

use config::BridgeConfig;

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = BridgeConfig::from_env()?;

    let store = Arc::new(TaskStore::open(&config.store_path)?);
    let api_token = config
        .token_source
        .token()
        .await
        .context("failed to acquire a platform token at startup")?;
    let github = Arc::new(GithubApiClient::new(GithubApiClientConfig {
        api_base: config.github_api_base.clone(),
        token: api_token,
        ..GithubApiClientConfig::default()
    })?);
    let provider = build_provider(&config.provider).context("failed to build provider")?;
    let provider_name = provider.name();

    let executor = Arc::new(Executor::new(
        ExecutorConfig {
            platform_base_url: config.platform_base_url.clone(),
            git_author_name: config.git_author_name.clone(),
            git_author_email: config.git_author_email.clone(),
            max_attempts: config.dispatcher.retry.max_attempts,
            provider_env: config.provider_env.clone(),
            ..ExecutorConfig::default()
        },
        provider,
        Arc::clone(&github),
        Arc::clone(&store),
        config.token_source.clone(),
    ));

    let runner: Arc<dyn swe_dispatch::TaskRunner> = executor.clone();
    let dispatcher = Dispatcher::new(config.dispatcher.clone(), runner);
    let pipeline = WebhookPipeline::new(
        PipelineConfig {
            webhook_secret: config.webhook_secret.clone(),
            trigger: config.trigger.clone(),
            enrichment_deadline: DEFAULT_ENRICHMENT_DEADLINE,
            authorizer: config.authorizer,
        },
        github,
        Arc::clone(&store),
        dispatcher.handle(),
        executor,
    );

    tracing::info!(
        provider = provider_name,
        workers = config.dispatcher.workers,
        queue = config.dispatcher.queue_capacity,
        trigger = %config.trigger,
        port = config.port,
        "swe-bridge starting"
    );

    let state = Arc::new(GatewayState {
        pipeline,
        store,
    });
    let serve_result = run_gateway_server(state, config.port).await;
    dispatcher.shutdown().await;
    serve_result
}
