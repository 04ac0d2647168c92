//! Server configuration.

use std::net::SocketAddr;

use genview_llm::LlmConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Default listen address for the generation endpoint.
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Generation endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: SocketAddr,
    /// Whether to answer cross-origin requests from browser front-ends
    pub cors: bool,
    /// Completion backend settings
    pub llm: LlmConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            cors: true,
            llm: LlmConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind = addr;
        self
    }

    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    /// Apply `GENVIEW_BIND` and the LLM environment overrides.
    pub fn with_env_overrides(mut self) -> ServerResult<Self> {
        if let Ok(bind) = std::env::var("GENVIEW_BIND") {
            if !bind.is_empty() {
                self.bind = bind
                    .parse()
                    .map_err(|e| ServerError::Config(format!("GENVIEW_BIND '{}': {}", bind, e)))?;
            }
        }
        self.llm = self.llm.with_env_overrides()?;
        Ok(self)
    }
}
