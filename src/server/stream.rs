//! Streaming chat handler and SSE frame emitter.
//!
//! Frames are JSON objects in SSE `data:` lines:
//! `{open:true}` once, `{delta}` per fragment, `{ping:n}` heartbeats while
//! waiting on the upstream, and exactly one terminal `{done,...}` or
//! `{error, modelTried}`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
};
use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ChatError;
use crate::llm::{GenerationConfig, StreamEvent, classify};
use crate::server::types::ChatRequest;
use crate::server::{CallerIdentity, GatewayState};
use crate::session::Turn;

/// History window sent upstream in fast mode.
const FAST_HISTORY_TURNS: usize = 8;

/// `POST /ai/chat/stream`
pub(crate) async fn chat_stream_handler(
    State(state): State<Arc<GatewayState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state.adapters.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            ChatError::MissingApiKey.to_string(),
        ));
    }
    if req.prompt.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, ChatError::EmptyPrompt.to_string()));
    }

    if req.reset {
        state.sessions.reset(&caller);
    }
    state.sessions.append(&caller, Turn::user(&req.prompt));

    let config = if req.fast {
        GenerationConfig::fast()
    } else {
        GenerationConfig::default()
    };
    let turns = if req.fast {
        state.sessions.tail(&caller, FAST_HISTORY_TURNS)
    } else {
        state.sessions.get(&caller)
    };

    let orchestrator = state
        .orchestrator()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // Orchestrator progress feeds the emitter through one ordered channel.
    let (progress_tx, progress_rx) = mpsc::channel::<StreamEvent>(64);
    tokio::spawn(async move {
        orchestrator
            .generate_stream(&turns, &config, progress_tx)
            .await;
    });

    let (frame_tx, frame_rx) = mpsc::channel::<serde_json::Value>(64);
    let heartbeat = state.config.heartbeat;
    tokio::spawn(emit_frames(state, caller, progress_rx, frame_tx, heartbeat));

    let events = ReceiverStream::new(frame_rx)
        .map(|payload| Ok::<_, Infallible>(Event::default().data(payload.to_string())));

    Ok((
        [
            ("X-Accel-Buffering", "no"),
            ("Cache-Control", "no-cache"),
        ],
        Sse::new(events),
    ))
}

/// Forward orchestrator progress as SSE frames, ticking heartbeats while
/// waiting.
///
/// A single `select!` loop owns both the heartbeat interval and the
/// progress channel, so the heartbeat cannot outlive the terminal frame on
/// any exit path (terminal event, orchestrator drop, client disconnect).
async fn emit_frames(
    state: Arc<GatewayState>,
    caller: String,
    mut progress: mpsc::Receiver<StreamEvent>,
    frames: mpsc::Sender<serde_json::Value>,
    heartbeat: Duration,
) {
    // Confirm the connection before any model latency is incurred.
    if frames.send(json!({ "open": true })).await.is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(heartbeat);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await; // the first tick is immediate
    let mut pings: u64 = 0;
    let mut accumulated = String::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                pings += 1;
                if frames.send(json!({ "ping": pings })).await.is_err() {
                    return;
                }
            }
            event = progress.recv() => {
                match event {
                    Some(StreamEvent::Delta(fragment)) => {
                        accumulated.push_str(&fragment);
                        if frames.send(json!({ "delta": fragment })).await.is_err() {
                            return;
                        }
                    }
                    Some(StreamEvent::Done { model, adapter, latency }) => {
                        // An all-empty stream still counts as success; the
                        // literal "(empty)" keeps the exchange visible in
                        // the conversation history.
                        let text = if accumulated.is_empty() {
                            "(empty)".to_string()
                        } else {
                            accumulated
                        };
                        state.sessions.append(&caller, Turn::assistant(&text));
                        tracing::info!(
                            caller = %caller,
                            model = %model,
                            adapter,
                            latency_ms = latency.as_millis() as u64,
                            "stream completed"
                        );
                        let _ = frames
                            .send(json!({
                                "done": true,
                                "model": model,
                                "sdk": adapter,
                                "latency": latency.as_millis() as u64,
                            }))
                            .await;
                        return;
                    }
                    Some(StreamEvent::Failed { attempted, reason }) => {
                        // No assistant turn on failure; the user's turn
                        // stays so a retry re-sends the same context.
                        let classified = classify(&reason, &attempted);
                        tracing::error!(
                            caller = %caller,
                            attempted = ?attempted,
                            category = ?classified.category,
                            reason = %reason,
                            "stream exhausted all candidates"
                        );
                        let _ = frames
                            .send(json!({
                                "error": classified.message,
                                "modelTried": attempted,
                            }))
                            .await;
                        return;
                    }
                    None => {
                        // Orchestrator dropped without a terminal event
                        // (panic or cancellation). Close the stream.
                        return;
                    }
                }
            }
        }
    }
}
