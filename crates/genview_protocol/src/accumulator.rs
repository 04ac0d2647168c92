//! Folding stream events into the current-best code buffer.

use tracing::warn;

use crate::event::StreamEvent;

/// What applying an event did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A fragment was appended
    Appended,
    /// The buffer was replaced by the cleaned final code
    Finalized,
    /// The event arrived after finalization and was dropped
    Ignored,
}

/// Running code buffer for one generation.
///
/// Holds either the concatenation of every fragment so far or, once a
/// `FinalCleaned` event has been applied, exactly the cleaned text. The swap
/// happens in a single assignment so readers never see a half-cleaned buffer.
#[derive(Debug, Clone, Default)]
pub struct CodeAccumulator {
    buffer: String,
    fragments: usize,
    finalized: bool,
}

impl CodeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the next event in arrival order.
    pub fn apply(&mut self, event: StreamEvent) -> Applied {
        if self.finalized {
            warn!("Ignoring stream event received after the cleaned code");
            return Applied::Ignored;
        }

        match event {
            StreamEvent::Fragment(text) => {
                self.buffer.push_str(&text);
                self.fragments += 1;
                Applied::Appended
            }
            StreamEvent::FinalCleaned(text) => {
                self.buffer = text;
                self.finalized = true;
                Applied::Finalized
            }
        }
    }

    /// Current contents of the buffer.
    pub fn code(&self) -> &str {
        &self.buffer
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Whether anything has been received at all.
    pub fn has_content(&self) -> bool {
        self.fragments > 0 || self.finalized
    }

    pub fn into_code(self) -> String {
        self.buffer
    }
}
