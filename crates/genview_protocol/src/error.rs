//! Error types for stream decoding.

use thiserror::Error;

/// Result type alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors surfaced while reading a generation stream.
///
/// Malformed records are not errors: the decoder drops them and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Transport failed mid-stream: {0}")]
    Transport(String),
}
