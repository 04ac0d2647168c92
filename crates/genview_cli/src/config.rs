//! Config file loading.

use std::path::Path;

use anyhow::{Context, Result};
use genview_server::ServerConfig;
use genview_studio::StudioConfig;
use serde::Deserialize;
use tracing::debug;

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "genview.toml";

/// Contents of `genview.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenviewConfig {
    pub server: ServerConfig,
    pub studio: StudioConfig,
}

impl GenviewConfig {
    /// Load `explicit`, or `genview.toml` if it exists, or defaults; then
    /// apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn with_env_overrides(self) -> Result<Self> {
        Ok(Self {
            server: self
                .server
                .with_env_overrides()
                .context("Invalid server configuration in environment")?,
            studio: self.studio.with_env_overrides(),
        })
    }
}
