//! Single-shot chat and diagnostics handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::config::DEFAULT_MODELS;
use crate::error::ChatError;
use crate::llm::{GenerationConfig, classify};
use crate::server::types::{ChatMeta, ChatRequest, ChatResponse, DiagnosticsResponse};
use crate::server::{CallerIdentity, GatewayState};
use crate::session::Turn;

/// Maximum prompt characters echoed back in the degraded no-credential reply.
const ECHO_PREVIEW_CHARS: usize = 120;

/// `POST /ai/chat`
pub(crate) async fn chat_handler(
    State(state): State<Arc<GatewayState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(req): Json<ChatRequest>,
) -> Result<Response, (StatusCode, String)> {
    if req.prompt.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, ChatError::EmptyPrompt.to_string()));
    }

    if req.reset {
        state.sessions.reset(&caller);
    }
    state.sessions.append(&caller, Turn::user(&req.prompt));

    // Degraded mode: no upstream credential configured. Reply with an echo
    // placeholder instead of failing the job-board page outright.
    if state.adapters.is_empty() {
        let reply = echo_reply(&req.prompt);
        state.sessions.append(&caller, Turn::assistant(&reply));
        return Ok(Json(ChatResponse {
            reply,
            meta: ChatMeta::default(),
        })
        .into_response());
    }

    let orchestrator = state
        .orchestrator()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let turns = state.sessions.get(&caller);
    match orchestrator
        .generate(&turns, &GenerationConfig::default())
        .await
    {
        Ok(generation) => {
            state
                .sessions
                .append(&caller, Turn::assistant(&generation.text));
            tracing::info!(
                caller = %caller,
                model = %generation.model,
                adapter = generation.adapter,
                latency_ms = generation.latency.as_millis() as u64,
                "chat completed"
            );
            Ok(Json(ChatResponse {
                reply: generation.text.clone(),
                meta: ChatMeta {
                    model: Some(generation.model.clone()),
                    chosen_model: Some(generation.model),
                    latency: Some(generation.latency.as_millis() as u64),
                    attempted_models: generation.attempted,
                    sdk_used: Some(generation.adapter.to_string()),
                    error: None,
                    error_category: None,
                },
            })
            .into_response())
        }
        Err(err) => {
            // The user's turn stays in the session; no assistant turn is
            // recorded, so a retry re-sends the same context.
            let (attempted, reason) = match err {
                ChatError::Exhausted { attempted, reason } => (attempted, reason),
                ChatError::DeadlineElapsed { attempted } => {
                    (attempted, "request deadline elapsed".to_string())
                }
                other => (Vec::new(), other.to_string()),
            };
            let classified = classify(&reason, &attempted);
            tracing::error!(
                caller = %caller,
                attempted = ?attempted,
                category = ?classified.category,
                reason = %reason,
                "chat exhausted all candidates"
            );
            Ok((
                StatusCode::BAD_GATEWAY,
                Json(ChatResponse {
                    reply: classified.message.clone(),
                    meta: ChatMeta {
                        attempted_models: attempted,
                        error: Some(classified.message),
                        error_category: Some(classified.category),
                        ..ChatMeta::default()
                    },
                }),
            )
                .into_response())
        }
    }
}

/// `GET /ai/diagnostics`
pub(crate) async fn diagnostics_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<DiagnosticsResponse>, (StatusCode, String)> {
    if !state.config.has_api_key() {
        return Err((
            StatusCode::BAD_REQUEST,
            ChatError::MissingApiKey.to_string(),
        ));
    }

    Ok(Json(DiagnosticsResponse {
        api_key_configured: true,
        preferred_model_configured: state.config.preferred_model.is_some(),
        default_models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        last_successful_model: state.hint.last_model(),
        last_successful_adapter: state.hint.last_adapter(),
    }))
}

/// Placeholder reply when no upstream credential is configured.
fn echo_reply(prompt: &str) -> String {
    let preview: String = prompt.chars().take(ECHO_PREVIEW_CHARS).collect();
    format!(
        "The AI assistant is not configured yet (missing provider API key). You said: \"{preview}\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::GatewayConfig;

    fn keyless_state() -> Arc<GatewayState> {
        Arc::new(GatewayState::new(GatewayConfig::default()).unwrap())
    }

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest {
            prompt: prompt.to_string(),
            reset: false,
            fast: false,
        }
    }

    #[tokio::test]
    async fn empty_prompt_rejected_without_session_mutation() {
        let state = keyless_state();
        let result = chat_handler(
            axum::extract::State(Arc::clone(&state)),
            CallerIdentity("u1".to_string()),
            Json(request("   ")),
        )
        .await;

        let (status, _) = result.err().expect("empty prompt must be rejected");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.sessions.is_empty("u1"), "no turn recorded");
    }

    #[tokio::test]
    async fn missing_key_degrades_to_echo_and_records_both_turns() {
        let state = keyless_state();
        let result = chat_handler(
            axum::extract::State(Arc::clone(&state)),
            CallerIdentity("u1".to_string()),
            Json(request("find rust jobs")),
        )
        .await;

        assert!(result.is_ok());
        let turns = state.sessions.get("u1");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "find rust jobs");
        assert!(turns[1].content.contains("find rust jobs"));
        assert!(turns[1].content.contains("not configured"));
    }

    #[tokio::test]
    async fn reset_clears_history_before_handling() {
        let state = keyless_state();
        state.sessions.append("u1", crate::session::Turn::user("old"));

        let req = ChatRequest {
            prompt: "new".to_string(),
            reset: true,
            fast: false,
        };
        chat_handler(
            axum::extract::State(Arc::clone(&state)),
            CallerIdentity("u1".to_string()),
            Json(req),
        )
        .await
        .unwrap();

        let turns = state.sessions.get("u1");
        assert_eq!(turns[0].content, "new", "old history gone");
    }

    #[tokio::test]
    async fn diagnostics_rejects_when_key_absent() {
        let state = keyless_state();
        let result = diagnostics_handler(axum::extract::State(state)).await;
        let (status, _) = result.err().expect("must reject without a key");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn echo_reply_truncates_long_prompts() {
        let long = "x".repeat(500);
        let reply = echo_reply(&long);
        assert!(reply.contains(&"x".repeat(ECHO_PREVIEW_CHARS)));
        assert!(!reply.contains(&"x".repeat(ECHO_PREVIEW_CHARS + 1)));
    }

    #[test]
    fn echo_reply_keeps_short_prompts_whole() {
        let reply = echo_reply("find rust jobs");
        assert!(reply.contains("find rust jobs"));
    }
}
