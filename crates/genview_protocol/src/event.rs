//! Decoded stream events.

/// One decoded unit of a generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text to append to the running buffer
    Fragment(String),
    /// Fully cleaned final code, replacing everything received so far
    FinalCleaned(String),
}

impl StreamEvent {
    pub fn text(&self) -> &str {
        match self {
            StreamEvent::Fragment(text) | StreamEvent::FinalCleaned(text) => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, StreamEvent::FinalCleaned(_))
    }
}
