//! Request/response types for the gateway's HTTP surface.

use serde::{Deserialize, Serialize};

use crate::llm::ErrorCategory;

/// Body for `POST /ai/chat` and `POST /ai/chat/stream`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
    /// Clear the caller's conversation before handling this prompt.
    #[serde(default)]
    pub reset: bool,
    /// Streaming only: shrink the history window and output budget for
    /// lower latency.
    #[serde(default)]
    pub fast: bool,
}

/// Routing metadata attached to every chat reply.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_model: Option<String>,
    /// Wall-clock latency in milliseconds, request start to terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    pub attempted_models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

/// Body for chat replies, success and exhaustion alike.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub meta: ChatMeta,
}

/// Body for `GET /ai/diagnostics`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsResponse {
    pub api_key_configured: bool,
    pub preferred_model_configured: bool,
    pub default_models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_successful_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_successful_adapter: Option<String>,
}
