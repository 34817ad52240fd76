//! Webhook gateway for the swe-bridge.
//!
//! Owns the HTTP surface and the ingestion pipeline that turns authenticated
//! comment deliveries into queued tasks.

pub mod authorize;
pub mod dedupe;
pub mod pipeline;
pub mod server;

pub use authorize::{authorize_actor, AuthorizerConfig};
pub use dedupe::CommentDeduper;
pub use pipeline::{PipelineConfig, WebhookOutcome, WebhookPipeline, DEFAULT_ENRICHMENT_DEADLINE};
pub use server::{build_gateway_router, run_gateway_server, GatewayState};
