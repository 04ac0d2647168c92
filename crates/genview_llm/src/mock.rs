//! Scripted completion backend for testing.
//!
//! Returns predefined token sequences and captures every conversation it
//! receives, so endpoint tests can run without a real provider.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use genview_protocol::Message;
use parking_lot::RwLock;

use crate::adapter::{CompletionBackend, TokenStream};
use crate::error::{LlmError, LlmResult};

/// One scripted completion.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these tokens, then end cleanly
    Tokens(Vec<String>),
    /// Stream these tokens, then fail with the message
    FailAfter(Vec<String>, String),
    /// Refuse before streaming
    Refuse(String),
}

/// Mock backend replaying scripts in order; the last script repeats.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    scripts: Arc<RwLock<VecDeque<Script>>>,
    captured: Arc<RwLock<Vec<Vec<Message>>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a clean completion made of `tokens`.
    pub fn with_tokens<I, T>(self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.with_script(Script::Tokens(tokens.into_iter().map(Into::into).collect()))
    }

    pub fn with_script(self, script: Script) -> Self {
        self.scripts.write().push_back(script);
        self
    }

    /// Conversations received so far.
    pub fn captured(&self) -> Vec<Vec<Message>> {
        self.captured.read().clone()
    }

    fn next_script(&self) -> Script {
        let mut scripts = self.scripts.write();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap_or_else(|| Script::Tokens(Vec::new()))
        } else {
            scripts.front().cloned().unwrap_or_else(|| Script::Tokens(Vec::new()))
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_completion(&self, conversation: &[Message]) -> LlmResult<TokenStream> {
        self.captured.write().push(conversation.to_vec());

        let items: Vec<LlmResult<String>> = match self.next_script() {
            Script::Tokens(tokens) => tokens.into_iter().map(Ok).collect(),
            Script::FailAfter(tokens, message) => tokens
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(LlmError::Stream(message))))
                .collect(),
            Script::Refuse(message) => {
                return Err(LlmError::Status {
                    provider: "Scripted",
                    status: 503,
                    body: message,
                })
            }
        };

        Ok(stream::iter(items).boxed())
    }
}
