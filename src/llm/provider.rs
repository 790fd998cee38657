//! Provider adapter trait and shared request types.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::LlmError;
use crate::session::{Role, Turn};

/// System instruction prepended to every upstream call.
pub const SYSTEM_INSTRUCTION: &str = "You are the job board's career assistant. \
Help users with job search, applications, resumes and interview preparation. \
Be concise and practical.";

/// Lazy sequence of text fragments from a streaming generation.
///
/// Finite and not restartable; the caller must drain it (or abandon it)
/// before the adapter's attempt counts as a success. Fragments may be
/// empty and should be skipped, not treated as errors.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Tunables for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 2048,
            temperature: 0.7,
        }
    }
}

impl GenerationConfig {
    /// Reduced output budget for the low-latency streaming mode.
    pub fn fast() -> Self {
        Self {
            max_output_tokens: 512,
            temperature: 0.7,
        }
    }
}

/// Render the turn history as `User:` / `Assistant:` lines.
///
/// The composite prompt form for adapters whose primary input is a single
/// text blob. Must carry the same semantic content as the structured
/// message-array form the alternate adapter sends.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| match t.role {
            Role::User => format!("User: {}", t.content),
            Role::Assistant => format!("Assistant: {}", t.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Uniform capability over the two upstream transports.
///
/// Both adapters talk to the same model family through different API
/// surfaces, so a failure on one is frequently an SDK/transport problem
/// rather than model unavailability. The failover cascade exploits this by
/// retrying the same model on the other adapter before advancing.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Short stable name used in logs, cache hints and response metadata.
    fn name(&self) -> &'static str;

    /// Generate a complete response in one call.
    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<String, LlmError>;

    /// Generate as a lazy sequence of text deltas.
    async fn generate_stream(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<TextStream, LlmError>;
}
