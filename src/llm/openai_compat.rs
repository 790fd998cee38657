//! OpenAI-compatible adapter for the same upstream model family.
//!
//! Gemini exposes a Chat Completions surface alongside its native API. The
//! failover cascade retries a model here when the native adapter fails,
//! since those failures are frequently transport/surface problems rather
//! than model unavailability. Input is the structured message-array form,
//! semantically identical to the native adapter's composite prompt.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;
use crate::llm::provider::{GenerationConfig, ProviderAdapter, SYSTEM_INSTRUCTION, TextStream};
use crate::session::{Role, Turn};

const ADAPTER_NAME: &str = "openai_compat";

/// Adapter for the upstream's OpenAI-compatible Chat Completions endpoint.
pub struct OpenAiCompatAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::RequestFailed {
                adapter: ADAPTER_NAME.to_string(),
                model: String::new(),
                reason: format!("Failed to build reqwest client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Chat Completions URL. Strips a trailing `/v1beta/openai` so a bare
    /// provider base URL and a full endpoint URL both work.
    fn api_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1beta/openai").unwrap_or(base);
        format!("{base}/v1beta/openai/chat/completions")
    }

    /// Structured message array: system instruction first, then the turns.
    fn build_messages(&self, turns: &[Turn]) -> Vec<WireMessage> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(WireMessage {
            role: "system".to_string(),
            content: SYSTEM_INSTRUCTION.to_string(),
        });
        for turn in turns {
            messages.push(WireMessage {
                role: match turn.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: turn.content.clone(),
            });
        }
        messages
    }

    fn status_error(&self, model: &str, status: reqwest::StatusCode, body: &str) -> LlmError {
        let snippet: String = body.chars().take(200).collect();
        let reason = format!("HTTP {status}: {snippet}");
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                adapter: ADAPTER_NAME.to_string(),
                reason,
            },
            404 => LlmError::ModelNotAvailable {
                adapter: ADAPTER_NAME.to_string(),
                model: model.to_string(),
            },
            429 => LlmError::RateLimited {
                adapter: ADAPTER_NAME.to_string(),
                model: model.to_string(),
            },
            _ => LlmError::RequestFailed {
                adapter: ADAPTER_NAME.to_string(),
                model: model.to_string(),
                reason,
            },
        }
    }

    async fn send(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages: self.build_messages(turns),
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
            stream,
        };

        tracing::debug!(model, adapter = ADAPTER_NAME, stream, "sending chat completion request");

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                adapter: ADAPTER_NAME.to_string(),
                model: model.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.status_error(model, status, &text));
        }
        Ok(response)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<String, LlmError> {
        let response = self.send(model, turns, config, false).await?;

        let text = response.text().await.map_err(|e| LlmError::RequestFailed {
            adapter: ADAPTER_NAME.to_string(),
            model: model.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;

        let value: Value = serde_json::from_str(&text).map_err(|e| LlmError::InvalidResponse {
            adapter: ADAPTER_NAME.to_string(),
            reason: format!("JSON parse error: {e}"),
        })?;

        Ok(extract_text(&value))
    }

    async fn generate_stream(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<TextStream, LlmError> {
        let response = self.send(model, turns, config, true).await?;

        let model_owned = model.to_string();
        let stream = response
            .bytes_stream()
            .eventsource()
            .map(move |event| match event {
                Ok(ev) => Ok(delta_from_chunk(&ev.data)),
                Err(e) => Err(LlmError::RequestFailed {
                    adapter: ADAPTER_NAME.to_string(),
                    model: model_owned.clone(),
                    reason: format!("stream decode error: {e}"),
                }),
            })
            .filter_map(|item| {
                futures::future::ready(match item {
                    Ok(Some(text)) => Some(Ok(text)),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                })
            })
            .boxed();

        Ok(stream)
    }
}

/// Extract the response text from the Chat Completions shapes, in priority
/// order; first non-empty wins. All-empty is a successful empty body.
fn extract_text(value: &Value) -> String {
    let extractors: &[fn(&Value) -> Option<String>] = &[
        extract_choice_message,
        extract_output_text,
        extract_direct_text,
    ];

    for extract in extractors {
        if let Some(text) = extract(value)
            && !text.is_empty()
        {
            return text;
        }
    }

    "No response generated.".to_string()
}

/// Shape 1: `choices[0].message.content`.
fn extract_choice_message(value: &Value) -> Option<String> {
    value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Shape 2: aggregated `output_text` field (Responses-style payloads).
fn extract_output_text(value: &Value) -> Option<String> {
    value
        .get("output_text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Shape 3: top-level `text` field.
fn extract_direct_text(value: &Value) -> Option<String> {
    value.get("text").and_then(Value::as_str).map(str::to_string)
}

/// Extract the delta text from one streaming SSE chunk.
///
/// The `[DONE]` sentinel and empty deltas map to `None` (skipped).
fn delta_from_chunk(data: &str) -> Option<String> {
    if data.trim() == "[DONE]" {
        return None;
    }
    let value: Value = serde_json::from_str(data).ok()?;
    let text = value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if text.is_empty() { None } else { Some(text.to_string()) }
}

// Chat Completions wire types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_url_appends_openai_path() {
        let adapter =
            OpenAiCompatAdapter::new("https://generativelanguage.googleapis.com", "k").unwrap();
        assert_eq!(
            adapter.api_url(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn api_url_tolerates_full_endpoint_base() {
        let adapter =
            OpenAiCompatAdapter::new("https://example.com/v1beta/openai/", "k").unwrap();
        assert_eq!(
            adapter.api_url(),
            "https://example.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn messages_start_with_system_then_turns() {
        let adapter = OpenAiCompatAdapter::new("https://example.com", "k").unwrap();
        let turns = vec![Turn::user("hello"), Turn::assistant("hi")];
        let messages = adapter.build_messages(&turns);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, SYSTEM_INSTRUCTION);
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "hello");
        assert_eq!(messages[2].role, "assistant");
    }

    #[test]
    fn extract_prefers_choice_message() {
        let value = json!({
            "choices": [{"message": {"content": "from choices"}}],
            "text": "from text"
        });
        assert_eq!(extract_text(&value), "from choices");
    }

    #[test]
    fn extract_falls_back_through_shapes() {
        let value = json!({ "output_text": "aggregated" });
        assert_eq!(extract_text(&value), "aggregated");

        let value = json!({ "text": "plain" });
        assert_eq!(extract_text(&value), "plain");
    }

    #[test]
    fn empty_content_yields_placeholder() {
        let value = json!({ "choices": [{"message": {"content": ""}}] });
        assert_eq!(extract_text(&value), "No response generated.");
    }

    #[test]
    fn stream_chunk_parsing() {
        assert_eq!(delta_from_chunk("[DONE]"), None);
        assert_eq!(
            delta_from_chunk(r#"{"choices":[{"delta":{"content":"hi"}}]}"#),
            Some("hi".to_string())
        );
        assert_eq!(delta_from_chunk(r#"{"choices":[{"delta":{}}]}"#), None);
        assert_eq!(
            delta_from_chunk(r#"{"choices":[{"delta":{"content":""}}]}"#),
            None
        );
    }
}
