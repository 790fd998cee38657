//! Axum HTTP server for the AI chat gateway.
//!
//! Routes: chat (single-shot and streaming), diagnostics, health. Callers
//! are authenticated by upstream middleware in the job-board app; the
//! gateway only consumes the identity header it forwards.

mod chat;
mod stream;
mod types;

pub use types::{ChatMeta, ChatRequest, ChatResponse, DiagnosticsResponse};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequestParts},
    http::{StatusCode, request::Parts},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::Error;
use crate::llm::{ProviderAdapter, RoutingHint, build_adapters};
use crate::session::SessionStore;

/// Session bucket for requests with no identity header.
const ANONYMOUS_CALLER: &str = "anonymous";

/// Header set by the job-board's auth middleware.
const CALLER_HEADER: &str = "x-user-id";

/// Shared state for all gateway routes.
pub struct GatewayState {
    pub config: GatewayConfig,
    pub sessions: SessionStore,
    pub hint: Arc<RoutingHint>,
    pub adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Result<Self, Error> {
        let adapters = build_adapters(&config)?;
        if adapters.is_empty() {
            tracing::warn!(
                "no upstream API key configured; /ai/chat degrades to echo, /ai/chat/stream rejects"
            );
        }
        Ok(Self {
            sessions: SessionStore::new(config.session_cap),
            hint: Arc::new(RoutingHint::new()),
            adapters,
            config,
        })
    }

    /// Build a failover orchestrator over the configured adapters.
    ///
    /// Callers must check `adapters` is non-empty first (no API key means
    /// an empty registry and endpoint-specific degradation).
    pub(crate) fn orchestrator(&self) -> Result<crate::llm::Orchestrator, crate::error::LlmError> {
        crate::llm::Orchestrator::new(
            self.adapters.clone(),
            Arc::clone(&self.hint),
            self.config.preferred_model.clone(),
            self.config.deadline,
        )
    }
}

/// Caller identity resolved from the auth header.
///
/// Absent identity collapses to a single shared anonymous bucket, matching
/// the behavior of unauthenticated visitors on the job board.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub String);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(ANONYMOUS_CALLER);
        Ok(CallerIdentity(caller.to_string()))
    }
}

/// Build the gateway router.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/ai/chat", post(chat::chat_handler))
        .route("/ai/chat/stream", post(stream::chat_stream_handler))
        .route("/ai/diagnostics", get(chat::diagnostics_handler))
        .route("/ai/health", get(health_handler))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: Arc<GatewayState>, addr: SocketAddr) -> Result<(), Error> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("AI gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
