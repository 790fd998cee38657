//! LLM provider layer: adapters, candidate routing and failover.
//!
//! Two adapters target the same upstream model family through different
//! API surfaces:
//! - **gemini**: the native Generative Language REST API
//! - **openai_compat**: the provider's OpenAI-compatible endpoint
//!
//! The orchestrator tries every adapter for a model before moving to the
//! next candidate model.

pub mod candidates;
pub mod classify;
mod failover;
mod gemini;
mod openai_compat;
mod provider;

pub use candidates::{RoutingHint, resolve_candidates};
pub use classify::{Classified, ErrorCategory, classify};
pub use failover::{Generation, Orchestrator, StreamEvent};
pub use gemini::GeminiAdapter;
pub use openai_compat::OpenAiCompatAdapter;
pub use provider::{
    GenerationConfig, ProviderAdapter, SYSTEM_INSTRUCTION, TextStream, render_transcript,
};

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::error::LlmError;

/// Build the adapter registry from configuration.
///
/// Registry order is cascade order: the native adapter first, then the
/// OpenAI-compatible surface. Returns an empty registry when no API key is
/// configured; callers degrade per endpoint instead of failing at startup.
pub fn build_adapters(config: &GatewayConfig) -> Result<Vec<Arc<dyn ProviderAdapter>>, LlmError> {
    let Some(api_key) = config.api_key() else {
        return Ok(Vec::new());
    };

    Ok(vec![
        Arc::new(GeminiAdapter::new(config.base_url.as_str(), api_key)?),
        Arc::new(OpenAiCompatAdapter::new(config.base_url.as_str(), api_key)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn no_key_yields_empty_registry() {
        let config = GatewayConfig::default();
        let adapters = build_adapters(&config).unwrap();
        assert!(adapters.is_empty());
    }

    #[test]
    fn key_yields_native_then_compat() {
        let config = GatewayConfig {
            api_key: Some(SecretString::from("k")),
            ..GatewayConfig::default()
        };
        let adapters = build_adapters(&config).unwrap();
        assert_eq!(adapters.len(), 2);
        assert_eq!(adapters[0].name(), "gemini");
        assert_eq!(adapters[1].name(), "openai_compat");
    }
}
