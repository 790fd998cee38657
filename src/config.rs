//! Configuration for the AI chat gateway.
//!
//! Everything is environment-driven. The only required credential is the
//! upstream Gemini API key; when it is absent the gateway degrades to an
//! echo-style placeholder on the non-streaming endpoint and rejects the
//! streaming endpoint outright.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

/// Hard-coded descending list of known-good models, newest first.
///
/// Tried after the routing hint and the configured preferred model. Kept
/// as the final safety net against a decommissioned configured model.
pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-flash",
];

/// Main configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Upstream API key. `None` degrades the chat endpoint to an echo reply.
    pub api_key: Option<SecretString>,

    /// Optional preferred model, tried before the hard-coded defaults.
    pub preferred_model: Option<String>,

    /// Base URL of the upstream provider.
    pub base_url: String,

    /// Maximum turns kept per session; oldest are evicted first.
    pub session_cap: usize,

    /// Overall deadline for one orchestrated request (all models, all
    /// adapters). Guarantees the client connection is never held open
    /// indefinitely.
    pub deadline: Duration,

    /// Heartbeat interval on the streaming endpoint.
    pub heartbeat: Duration,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let api_key = optional_env("GEMINI_API_KEY")?.map(SecretString::from);
        let preferred_model = optional_env("GEMINI_MODEL")?;
        let base_url = optional_env("GEMINI_BASE_URL")?
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());
        let session_cap = parse_optional_env("AI_GATEWAY_SESSION_CAP", 32usize)?;
        let deadline_secs = parse_optional_env("AI_GATEWAY_DEADLINE_SECS", 120u64)?;
        let heartbeat_secs = parse_optional_env("AI_GATEWAY_HEARTBEAT_SECS", 12u64)?;

        Ok(Self {
            api_key,
            preferred_model,
            base_url,
            session_cap,
            deadline: Duration::from_secs(deadline_secs),
            heartbeat: Duration::from_secs(heartbeat_secs),
        })
    }

    /// Whether the upstream credential is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Borrow the API key, if present.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|k| k.expose_secret())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            preferred_model: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            session_cap: 32,
            deadline: Duration::from_secs(120),
            heartbeat: Duration::from_secs(12),
        }
    }
}

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}
