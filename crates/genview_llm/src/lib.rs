//! # genview_llm
//!
//! LLM collaborator for the genview generation endpoint.
//!
//! This crate turns a generation request into a two-message conversation
//! (system instructions + user content) and streams the model's reply back
//! as text deltas.
//!
//! # Features
//!
//! - **Providers**: OpenAI chat completions and Anthropic messages, both over SSE
//! - **Prompt Templates**: separate system instructions for initial and fix mode
//! - **Scripted Backend**: deterministic token scripts for tests

pub mod adapter;
pub mod config;
pub mod error;
pub mod mock;
pub mod prompts;
pub mod sse;

pub use adapter::{CompletionBackend, LlmAdapter, TokenStream};
pub use config::{LlmConfig, LlmProvider};
pub use error::{LlmError, LlmResult};
pub use mock::{Script, ScriptedBackend};
pub use prompts::{build_conversation, system_prompt, user_content};
pub use sse::{SseDeltaParser, SseItem};
