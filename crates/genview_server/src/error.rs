//! Error types for the generation endpoint.

use thiserror::Error;

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(#[from] genview_llm::LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
