//! Studio configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default generation endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8787/api/generate";

/// Tunables of the generation and auto-fix loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// URL of the generation endpoint
    pub endpoint: String,
    /// Delay after a generation before the first error check (ms)
    pub settle_delay_ms: u64,
    /// Interval of the recurring error check (ms)
    pub poll_interval_ms: u64,
    /// Automatic fix attempts per session
    pub max_auto_fix_attempts: u32,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            settle_delay_ms: 2000,
            poll_interval_ms: 3000,
            max_auto_fix_attempts: 3,
        }
    }
}

impl StudioConfig {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn max_auto_fix_attempts(mut self, attempts: u32) -> Self {
        self.max_auto_fix_attempts = attempts;
        self
    }

    /// Apply the `GENVIEW_ENDPOINT` override.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("GENVIEW_ENDPOINT") {
            if !endpoint.is_empty() {
                self.endpoint = endpoint;
            }
        }
        self
    }

    pub fn settle_delay_duration(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval_duration(&self) -> Duration {
        // A zero interval would make the poller spin.
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
