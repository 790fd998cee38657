//! Error types for the AI chat gateway.

/// Top-level error type for the gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Per-attempt errors from a provider adapter.
///
/// These are always caught by the failover cascade and retried against the
/// next adapter or model; they never reach the caller directly. Only the
/// terminal [`ChatError::Exhausted`] is user-visible.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Adapter {adapter} request failed for {model}: {reason}")]
    RequestFailed {
        adapter: String,
        model: String,
        reason: String,
    },

    #[error("Adapter {adapter} rate limited on {model}")]
    RateLimited { adapter: String, model: String },

    #[error("Invalid response from {adapter}: {reason}")]
    InvalidResponse { adapter: String, reason: String },

    #[error("Model {model} not found on adapter {adapter}")]
    ModelNotAvailable { adapter: String, model: String },

    #[error("Authentication failed for adapter {adapter}: {reason}")]
    AuthFailed { adapter: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal errors surfaced to the gateway's callers.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Missing or empty prompt. Never retried.
    #[error("Prompt must be a non-empty string")]
    EmptyPrompt,

    /// The upstream credential is absent from configuration. No upstream
    /// call is attempted.
    #[error("Upstream API key is not configured")]
    MissingApiKey,

    /// Every candidate model failed on every adapter.
    #[error("All candidate models failed (tried: {})", attempted.join(", "))]
    Exhausted {
        attempted: Vec<String>,
        reason: String,
    },

    /// The overall request deadline elapsed before any adapter succeeded.
    #[error("Request deadline elapsed after trying: {}", attempted.join(", "))]
    DeadlineElapsed { attempted: Vec<String> },
}

/// Result type alias for the gateway.
pub type Result<T> = std::result::Result<T, Error>;
