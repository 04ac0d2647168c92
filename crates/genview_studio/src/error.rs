//! Error types for the studio.

use genview_protocol::StreamError;
use thiserror::Error;

/// Result type for studio operations
pub type StudioResult<T> = Result<T, StudioError>;

/// Studio errors
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("A generation is already in progress")]
    Busy,

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Fix instruction must not be empty")]
    EmptyInstruction,

    #[error("No generated code to fix yet")]
    NoArtifact,

    #[error("Generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation stream broke off: {0}")]
    Stream(#[from] StreamError),

    #[error("Generation produced no code")]
    EmptyCompletion,

    #[error("Sandbox inspection failed: {0}")]
    Inspect(String),

    #[error("Preview error: {0}")]
    Preview(String),

    #[error("Scheduler already started")]
    AlreadyStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    /// Whether the request was turned away before any generation started.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StudioError::Busy
                | StudioError::EmptyPrompt
                | StudioError::EmptyInstruction
                | StudioError::NoArtifact
        )
    }

    /// Whether the error came from the generation transport.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StudioError::Status { .. } | StudioError::Http(_) | StudioError::Stream(_)
        )
    }
}
