//! Error types
//!
//! Only call-level failures live here. Per-action failures (bad arguments,
//! unknown capability, capability errors) never surface as `AgentError`;
//! they are recorded in the returned [`ExecutionState`](crate::state::ExecutionState).

use thiserror::Error;

/// Fatal errors for a `complete`, `chat` or `execute` call
#[derive(Debug, Error)]
pub enum AgentError {
    /// The remote service answered with an explicit `error` envelope
    #[error("Error in querying LLM: {0}")]
    Remote(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested model is not listed in the remote catalog
    #[error("Unknown model '{model}', available models: {available}")]
    UnknownModel { model: String, available: String },

    /// Every attempt produced empty or mis-shaped content
    #[error("No usable response after {attempts} attempts")]
    RetriesExhausted { attempts: usize },
}

pub type AgentResult<T> = Result<T, AgentError>;
