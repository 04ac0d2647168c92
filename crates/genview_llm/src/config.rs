//! LLM provider configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "gpt-5-mini",
            LlmProvider::Anthropic => "claude-sonnet-4.5",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "https://api.openai.com",
            LlmProvider::Anthropic => "https://api.anthropic.com",
        }
    }

    /// Environment variable holding the API key for this provider.
    pub fn key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenAI => write!(f, "OpenAI"),
            LlmProvider::Anthropic => write!(f, "Anthropic"),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "anthropic" => Ok(LlmProvider::Anthropic),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

/// Settings for the completion backend.
///
/// Loaded from the `[llm]` table of the config file; the API key is only
/// ever taken from the environment or set programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Explicit provider; `None` picks the first provider with a key set
    pub provider: Option<LlmProvider>,
    /// Model override (defaults per provider)
    pub model: Option<String>,
    /// API base URL override, mainly for proxies and tests
    pub base_url: Option<String>,
    /// Completion token limit
    pub max_tokens: u32,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            base_url: None,
            max_tokens: 4096,
            api_key: None,
        }
    }
}

impl LlmConfig {
    pub fn provider(mut self, provider: LlmProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Apply `GENVIEW_LLM_PROVIDER` and `GENVIEW_LLM_MODEL` overrides.
    pub fn with_env_overrides(mut self) -> Result<Self, LlmError> {
        if let Ok(provider) = std::env::var("GENVIEW_LLM_PROVIDER") {
            if !provider.is_empty() {
                self.provider = Some(provider.parse()?);
            }
        }
        if let Ok(model) = std::env::var("GENVIEW_LLM_MODEL") {
            if !model.is_empty() {
                self.model = Some(model);
            }
        }
        Ok(self)
    }

    /// Resolve the provider and API key.
    ///
    /// Checks in order:
    /// 1. an explicit key with the configured (or default) provider
    /// 2. the configured provider's key variable
    /// 3. OPENAI_API_KEY, then ANTHROPIC_API_KEY when no provider is configured
    pub fn resolve_credentials(&self) -> Result<(LlmProvider, String), LlmError> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok((self.provider.unwrap_or_default(), key.clone()));
        }

        let candidates = match self.provider {
            Some(provider) => vec![provider],
            None => vec![LlmProvider::OpenAI, LlmProvider::Anthropic],
        };

        for provider in candidates {
            if let Ok(key) = std::env::var(provider.key_var()) {
                if !key.is_empty() {
                    return Ok((provider, key));
                }
            }
        }

        Err(LlmError::NotConfigured)
    }
}
