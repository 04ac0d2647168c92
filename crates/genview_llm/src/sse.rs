//! Server-sent-event parsing for provider streaming responses.

use genview_protocol::LineBuffer;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LlmProvider;

/// One meaningful item extracted from a provider's SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    /// A text delta to forward
    Delta(String),
    /// The provider signalled the end of the completion
    Done,
    /// The provider reported an error inside the stream
    Failed(String),
}

/// Incremental parser for `data:` lines of an SSE body.
#[derive(Debug)]
pub struct SseDeltaParser {
    provider: LlmProvider,
    lines: LineBuffer,
}

impl SseDeltaParser {
    pub fn new(provider: LlmProvider) -> Self {
        Self {
            provider,
            lines: LineBuffer::new(),
        }
    }

    /// Feed a chunk and return the items it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseItem> {
        self.lines
            .push(chunk)
            .into_iter()
            .filter_map(|line| self.parse_line(&line))
            .collect()
    }

    /// Parse whatever remains once the body has ended.
    pub fn finish(&mut self) -> Option<SseItem> {
        let line = self.lines.finish()?;
        self.parse_line(&line)
    }

    fn parse_line(&self, line: &str) -> Option<SseItem> {
        let line = line.trim();
        // Comments, event names and blank separators carry no payload.
        let data = line.strip_prefix("data:")?.trim();
        if data.is_empty() {
            return None;
        }
        if data == "[DONE]" {
            return Some(SseItem::Done);
        }

        let event: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                warn!("Skipping unparseable {} stream event: {}", self.provider, e);
                return None;
            }
        };

        match self.provider {
            LlmProvider::OpenAI => openai_item(&event),
            LlmProvider::Anthropic => anthropic_item(&event),
        }
    }
}

fn openai_item(event: &Value) -> Option<SseItem> {
    if let Some(message) = event.pointer("/error/message").and_then(Value::as_str) {
        return Some(SseItem::Failed(message.to_string()));
    }
    event
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(|text| SseItem::Delta(text.to_string()))
}

fn anthropic_item(event: &Value) -> Option<SseItem> {
    match event.get("type").and_then(Value::as_str)? {
        "content_block_delta" => event
            .pointer("/delta/text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(|text| SseItem::Delta(text.to_string())),
        "message_stop" => Some(SseItem::Done),
        "error" => {
            let message = event
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Some(SseItem::Failed(message.to_string()))
        }
        other => {
            debug!("Ignoring Anthropic event: {}", other);
            None
        }
    }
}
