//! Multi-model, multi-adapter failover.
//!
//! Drives the candidate cascade: for each candidate model, try every
//! adapter in registry order before advancing to the next model. Adapter
//! failures are logged and swallowed; only total exhaustion is surfaced.
//! The first success is recorded in the routing hint so later requests in
//! the same process start from what last worked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::config::DEFAULT_MODELS;
use crate::error::{ChatError, LlmError};
use crate::llm::candidates::{RoutingHint, resolve_candidates};
use crate::llm::provider::{GenerationConfig, ProviderAdapter};
use crate::session::Turn;

/// A successful generation with its routing metadata.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub adapter: &'static str,
    pub latency: Duration,
    /// Models attempted, in order, including the successful one.
    pub attempted: Vec<String>,
}

/// Progress events on the streaming path.
#[derive(Debug)]
pub enum StreamEvent {
    /// A non-empty text fragment, forwarded in arrival order.
    Delta(String),
    /// Terminal success. Exactly one terminal event is emitted per request.
    Done {
        model: String,
        adapter: &'static str,
        latency: Duration,
    },
    /// Terminal failure after exhausting all candidates (or the deadline).
    Failed {
        attempted: Vec<String>,
        reason: String,
    },
}

/// Iterates candidate models across the adapter registry until one yields
/// output.
pub struct Orchestrator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    hint: Arc<RoutingHint>,
    preferred_model: Option<String>,
    deadline: Duration,
}

impl Orchestrator {
    /// Create an orchestrator over an ordered adapter registry.
    ///
    /// Returns an error if `adapters` is empty.
    pub fn new(
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        hint: Arc<RoutingHint>,
        preferred_model: Option<String>,
        deadline: Duration,
    ) -> Result<Self, LlmError> {
        if adapters.is_empty() {
            return Err(LlmError::RequestFailed {
                adapter: "failover".to_string(),
                model: String::new(),
                reason: "Orchestrator requires at least one adapter".to_string(),
            });
        }
        Ok(Self {
            adapters,
            hint,
            preferred_model,
            deadline,
        })
    }

    /// Candidate models for this request, hint first.
    pub fn candidates(&self) -> Vec<String> {
        let cached = self.hint.last_model();
        resolve_candidates(
            cached.as_deref(),
            self.preferred_model.as_deref(),
            DEFAULT_MODELS,
        )
    }

    /// Run the cascade for a single-shot generation.
    ///
    /// At most one adapter call succeeds; the cascade stops immediately on
    /// success. Latency covers the whole request, failures included.
    pub async fn generate(
        &self,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<Generation, ChatError> {
        let started = Instant::now();
        let hard_deadline = started + self.deadline;
        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<LlmError> = None;

        for model in self.candidates() {
            attempted.push(model.clone());

            for adapter in &self.adapters {
                let Some(remaining) = hard_deadline.checked_duration_since(Instant::now()) else {
                    return Err(ChatError::DeadlineElapsed { attempted });
                };

                match tokio::time::timeout(remaining, adapter.generate(&model, turns, config))
                    .await
                {
                    Err(_) => return Err(ChatError::DeadlineElapsed { attempted }),
                    Ok(Ok(text)) => {
                        self.hint.record(&model, adapter.name());
                        return Ok(Generation {
                            text,
                            model,
                            adapter: adapter.name(),
                            latency: started.elapsed(),
                            attempted,
                        });
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(
                            model = %model,
                            adapter = adapter.name(),
                            error = %err,
                            "adapter attempt failed, cascading"
                        );
                        last_error = Some(err);
                    }
                }
            }
        }

        Err(ChatError::Exhausted {
            attempted,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no candidate models resolved".to_string()),
        })
    }

    /// Run the cascade on the streaming path, forwarding fragments into
    /// `tx` as they arrive.
    ///
    /// Retries the next adapter/model only while zero fragments have been
    /// forwarded; once any output is committed to the caller it cannot be
    /// un-sent, so a mid-stream failure is terminal. Exactly one terminal
    /// event (`Done` or `Failed`) is sent. A send failure means the caller
    /// disconnected; the drain stops quietly.
    pub async fn generate_stream(
        &self,
        turns: &[Turn],
        config: &GenerationConfig,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let started = Instant::now();
        let hard_deadline = started + self.deadline;
        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<LlmError> = None;

        for model in self.candidates() {
            attempted.push(model.clone());

            for adapter in &self.adapters {
                let Some(remaining) = hard_deadline.checked_duration_since(Instant::now()) else {
                    let _ = tx
                        .send(StreamEvent::Failed {
                            attempted,
                            reason: "request deadline elapsed".to_string(),
                        })
                        .await;
                    return;
                };

                let opened = tokio::time::timeout(
                    remaining,
                    adapter.generate_stream(&model, turns, config),
                )
                .await;

                let mut stream = match opened {
                    Err(_) => {
                        let _ = tx
                            .send(StreamEvent::Failed {
                                attempted,
                                reason: "request deadline elapsed".to_string(),
                            })
                            .await;
                        return;
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(
                            model = %model,
                            adapter = adapter.name(),
                            error = %err,
                            "stream open failed, cascading"
                        );
                        last_error = Some(err);
                        continue;
                    }
                    Ok(Ok(stream)) => stream,
                };

                let mut forwarded = false;
                let mut stream_error: Option<LlmError> = None;

                loop {
                    let Some(remaining) = hard_deadline.checked_duration_since(Instant::now())
                    else {
                        let _ = tx
                            .send(StreamEvent::Failed {
                                attempted,
                                reason: "request deadline elapsed".to_string(),
                            })
                            .await;
                        return;
                    };

                    match tokio::time::timeout(remaining, stream.next()).await {
                        Err(_) => {
                            let _ = tx
                                .send(StreamEvent::Failed {
                                    attempted,
                                    reason: "request deadline elapsed".to_string(),
                                })
                                .await;
                            return;
                        }
                        Ok(None) => {
                            // Fully drained: this attempt succeeded even if
                            // every fragment was empty.
                            self.hint.record(&model, adapter.name());
                            let _ = tx
                                .send(StreamEvent::Done {
                                    model,
                                    adapter: adapter.name(),
                                    latency: started.elapsed(),
                                })
                                .await;
                            return;
                        }
                        Ok(Some(Ok(fragment))) => {
                            if fragment.is_empty() {
                                continue;
                            }
                            if tx.send(StreamEvent::Delta(fragment)).await.is_err() {
                                // Caller disconnected; abandon the upstream.
                                return;
                            }
                            forwarded = true;
                        }
                        Ok(Some(Err(err))) => {
                            stream_error = Some(err);
                            break;
                        }
                    }
                }

                let err = stream_error.expect("loop exits with error or returns");
                if forwarded {
                    // Partial output already committed to the caller.
                    tracing::warn!(
                        model = %model,
                        adapter = adapter.name(),
                        error = %err,
                        "stream failed after partial output, not retrying"
                    );
                    let _ = tx
                        .send(StreamEvent::Failed {
                            attempted,
                            reason: err.to_string(),
                        })
                        .await;
                    return;
                }

                tracing::warn!(
                    model = %model,
                    adapter = adapter.name(),
                    error = %err,
                    "stream failed before any output, cascading"
                );
                last_error = Some(err);
            }
        }

        let _ = tx
            .send(StreamEvent::Failed {
                attempted,
                reason: last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no candidate models resolved".to_string()),
            })
            .await;
    }
}
