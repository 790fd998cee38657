//! Native Gemini REST adapter.
//!
//! Talks to the `generateContent` / `streamGenerateContent` endpoints of the
//! Generative Language API. Its primary input is the composite prompt form:
//! the fixed system instruction concatenated with the rendered transcript.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;
use crate::llm::provider::{
    GenerationConfig, ProviderAdapter, SYSTEM_INSTRUCTION, TextStream, render_transcript,
};
use crate::session::Turn;

const ADAPTER_NAME: &str = "gemini";

/// Adapter for the native Generative Language REST API.
pub struct GeminiAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiAdapter {
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

    /// Construct the endpoint URL for a model and method.
    fn api_url(&self, model: &str, method: &str, sse: bool) -> String {
        let base = self.base_url.trim_end_matches('/');
        let alt = if sse { "&alt=sse" } else { "" };
        format!("{base}/v1beta/models/{model}:{method}?key={}{alt}", self.api_key)
    }

    fn build_body(&self, turns: &[Turn], config: &GenerationConfig) -> GenerateContentRequest {
        // Composite prompt: system instruction + serialized transcript,
        // carried as a single user part. Semantically identical to the
        // structured form the alternate adapter sends.
        let prompt = format!("{SYSTEM_INSTRUCTION}\n\n{}", render_transcript(turns));
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: WireGenerationConfig {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
            },
        }
    }

    /// Map a non-success HTTP status onto the adapter error taxonomy.
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
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<String, LlmError> {
        let url = self.api_url(model, "generateContent", false);
        let body = self.build_body(turns, config);

        tracing::debug!(model, adapter = ADAPTER_NAME, "sending generateContent request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                adapter: ADAPTER_NAME.to_string(),
                model: model.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| LlmError::RequestFailed {
            adapter: ADAPTER_NAME.to_string(),
            model: model.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(self.status_error(model, status, &text));
        }

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
        let url = self.api_url(model, "streamGenerateContent", true);
        let body = self.build_body(turns, config);

        let response = self
            .client
            .post(&url)
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

/// Extract the response text, tolerating the shapes different API versions
/// produce. Extractors run in priority order; first non-empty wins. An
/// all-empty response is a successful empty body, not a gateway failure.
fn extract_text(value: &Value) -> String {
    let extractors: &[fn(&Value) -> Option<String>] = &[
        extract_direct_text,
        extract_output_text,
        extract_candidate_parts,
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

/// Shape 1: top-level `text` field (oldest surface).
fn extract_direct_text(value: &Value) -> Option<String> {
    value.get("text").and_then(Value::as_str).map(str::to_string)
}

/// Shape 2: aggregated `output_text` field.
fn extract_output_text(value: &Value) -> Option<String> {
    value
        .get("output_text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Shape 3: `candidates[0].content.parts[*].text`, parts concatenated.
fn extract_candidate_parts(value: &Value) -> Option<String> {
    let parts = value
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

/// Extract the delta text from one streaming SSE chunk.
fn delta_from_chunk(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    let text = extract_candidate_parts(&value)
        .or_else(|| extract_direct_text(&value))
        .unwrap_or_default();
    if text.is_empty() { None } else { Some(text) }
}

// Generative Language API wire types

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct WireGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_url_includes_key_and_method() {
        let adapter =
            GeminiAdapter::new("https://generativelanguage.googleapis.com/", "k123").unwrap();
        let url = adapter.api_url("gemini-2.0-flash", "generateContent", false);
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent?key=k123"
        );
    }

    #[test]
    fn api_url_streaming_adds_sse_alt() {
        let adapter = GeminiAdapter::new("https://example.com", "k").unwrap();
        let url = adapter.api_url("m", "streamGenerateContent", true);
        assert!(url.ends_with("streamGenerateContent?key=k&alt=sse"));
    }

    #[test]
    fn composite_prompt_carries_system_and_transcript() {
        let adapter = GeminiAdapter::new("https://example.com", "k").unwrap();
        let turns = vec![Turn::user("hello"), Turn::assistant("hi")];
        let body = adapter.build_body(&turns, &GenerationConfig::default());

        assert_eq!(body.contents.len(), 1);
        let prompt = &body.contents[0].parts[0].text;
        assert!(prompt.starts_with(SYSTEM_INSTRUCTION));
        assert!(prompt.contains("User: hello"));
        assert!(prompt.contains("Assistant: hi"));
    }

    #[test]
    fn extract_prefers_direct_text() {
        let value = json!({
            "text": "direct",
            "candidates": [{"content": {"parts": [{"text": "nested"}]}}]
        });
        assert_eq!(extract_text(&value), "direct");
    }

    #[test]
    fn extract_falls_through_to_candidate_parts() {
        let value = json!({
            "candidates": [{"content": {"parts": [{"text": "part one "}, {"text": "part two"}]}}]
        });
        assert_eq!(extract_text(&value), "part one part two");
    }

    #[test]
    fn extract_output_text_shape() {
        let value = json!({ "output_text": "aggregated" });
        assert_eq!(extract_text(&value), "aggregated");
    }

    #[test]
    fn all_empty_shapes_yield_placeholder_not_error() {
        let value = json!({ "text": "", "candidates": [{"content": {"parts": []}}] });
        assert_eq!(extract_text(&value), "No response generated.");

        let value = json!({ "unrelated": true });
        assert_eq!(extract_text(&value), "No response generated.");
    }

    #[test]
    fn stream_chunk_with_empty_part_is_skipped() {
        assert_eq!(
            delta_from_chunk(r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#),
            None
        );
        assert_eq!(
            delta_from_chunk(r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#),
            Some("hi".to_string())
        );
        // Malformed chunks are skipped rather than fatal.
        assert_eq!(delta_from_chunk("not json"), None);
    }

    #[test]
    fn status_error_maps_http_taxonomy() {
        let adapter = GeminiAdapter::new("https://example.com", "k").unwrap();
        assert!(matches!(
            adapter.status_error("m", reqwest::StatusCode::FORBIDDEN, "denied"),
            LlmError::AuthFailed { .. }
        ));
        assert!(matches!(
            adapter.status_error("m", reqwest::StatusCode::NOT_FOUND, "no model"),
            LlmError::ModelNotAvailable { .. }
        ));
        assert!(matches!(
            adapter.status_error("m", reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            adapter.status_error("m", reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            LlmError::RequestFailed { .. }
        ));
    }
}
