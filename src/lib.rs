//! AI chat gateway for the job board: session-aware chat over a failover
//! cascade of upstream model adapters, with an SSE streaming surface.

pub mod config;
pub mod error;
pub mod llm;
pub mod server;
pub mod session;

pub use config::GatewayConfig;
pub use error::{ChatError, ConfigError, Error, LlmError, Result};
pub use server::GatewayState;
