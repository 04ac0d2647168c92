//! Error types for LLM calls.

use thiserror::Error;

/// Result type alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur while talking to an LLM provider.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM stream failed: {0}")]
    Stream(String),
}
