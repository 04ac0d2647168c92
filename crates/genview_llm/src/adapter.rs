//! Streaming LLM adapter.
//!
//! Supports OpenAI and Anthropic APIs. Both are asked for incremental
//! output and every text delta is surfaced as one stream item.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use genview_protocol::{Message, MessageRole};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{LlmError, LlmResult};
use crate::sse::{SseDeltaParser, SseItem};

/// Lazily produced text deltas of one completion.
pub type TokenStream = BoxStream<'static, LlmResult<String>>;

/// Anything that can stream a chat completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Start a completion. Errors returned here happen before any token is
    /// produced; errors inside the stream abort it mid-way.
    async fn stream_completion(&self, conversation: &[Message]) -> LlmResult<TokenStream>;
}

/// LLM adapter that handles API calls
pub struct LlmAdapter {
    provider: LlmProvider,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl LlmAdapter {
    /// Create a new LLM adapter with explicit configuration
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        Self {
            provider,
            api_key,
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            base_url: provider.default_base_url().to_string(),
            max_tokens: 4096,
            client: reqwest::Client::new(),
        }
    }

    /// Create an adapter from resolved configuration.
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        let (provider, api_key) = config.resolve_credentials()?;
        let mut adapter = Self::new(provider, api_key, config.model.clone());
        if let Some(url) = &config.base_url {
            adapter.base_url = url.trim_end_matches('/').to_string();
        }
        adapter.max_tokens = config.max_tokens;
        Ok(adapter)
    }

    /// Create an LLM adapter from environment variables
    ///
    /// Checks in order:
    /// 1. OPENAI_API_KEY
    /// 2. ANTHROPIC_API_KEY
    pub fn from_env() -> LlmResult<Self> {
        Self::from_config(&LlmConfig::default().with_env_overrides()?)
    }

    /// Point the adapter at another API host.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the current provider
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Get the current model
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn open_openai(&self, conversation: &[Message]) -> LlmResult<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = OpenAIRequest {
            model: &self.model,
            messages: conversation
                .iter()
                .map(|m| ChatTurn {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_completion_tokens: Some(self.max_tokens),
            stream: true,
        };

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;
        Ok(response)
    }

    async fn open_anthropic(&self, conversation: &[Message]) -> LlmResult<reqwest::Response> {
        let url = format!("{}/v1/messages", self.base_url);

        // Anthropic requires system message to be separate
        let system = conversation
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str());

        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: conversation
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .map(|m| ChatTurn {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: true,
        };

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for LlmAdapter {
    fn name(&self) -> &str {
        &self.model
    }

    async fn stream_completion(&self, conversation: &[Message]) -> LlmResult<TokenStream> {
        info!("Requesting {} completion from {}", self.model, self.provider);

        let response = match self.provider {
            LlmProvider::OpenAI => self.open_openai(conversation).await?,
            LlmProvider::Anthropic => self.open_anthropic(conversation).await?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                provider: match self.provider {
                    LlmProvider::OpenAI => "OpenAI",
                    LlmProvider::Anthropic => "Anthropic",
                },
                status: status.as_u16(),
                body,
            });
        }

        Ok(delta_stream(self.provider, response))
    }
}

struct DeltaState {
    body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    parser: SseDeltaParser,
    ready: VecDeque<SseItem>,
    done: bool,
}

fn delta_stream(provider: LlmProvider, response: reqwest::Response) -> TokenStream {
    let state = DeltaState {
        body: response.bytes_stream().boxed(),
        parser: SseDeltaParser::new(provider),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            match st.ready.pop_front() {
                Some(SseItem::Delta(text)) => return Some((Ok(text), st)),
                Some(SseItem::Done) => {
                    debug!("Provider signalled end of completion");
                    return None;
                }
                Some(SseItem::Failed(message)) => {
                    st.ready.clear();
                    st.done = true;
                    return Some((Err(LlmError::Stream(message)), st));
                }
                None if st.done => return None,
                None => {}
            }

            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let items = st.parser.push(&chunk);
                    st.ready.extend(items);
                }
                Some(Err(e)) => {
                    warn!("Completion stream dropped: {}", e);
                    st.done = true;
                    return Some((Err(LlmError::Http(e)), st));
                }
                None => {
                    st.done = true;
                    st.ready.extend(st.parser.finish());
                }
            }
        }
    })
    .boxed()
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'a str,
    content: &'a str,
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    stream: bool,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ChatTurn<'a>>,
    stream: bool,
}
