//! Conversation transcript of a session.

use genview_protocol::Message;

/// Ordered, append-only message log. Role alternation is not enforced:
/// several fix requests may follow each other.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and start over with `first`.
    pub fn restart_with(&mut self, first: Message) {
        self.messages.clear();
        self.messages.push(first);
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
