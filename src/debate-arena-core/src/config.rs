//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ArenaError;

/// Environment variable holding the generation service base URL.
pub const BASE_URL_ENV: &str = "DEBATE_ARENA_API_BASE_URL";

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Connection settings for the generation service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    /// Generation requests wait for script and audio synthesis, so this is long.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 180,
            connect_timeout_secs: 30,
        }
    }
}

/// Initial selections for a new debate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub topic: String,
    pub turns: u32,
    pub humor_mode: bool,
    pub persona_a: Option<String>,
    pub persona_b: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            topic: "Will AI improve education outcomes in the next decade?".to_string(),
            turns: 6,
            humor_mode: false,
            persona_a: None,
            persona_b: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArenaError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ArenaError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ArenaError> {
        toml::from_str(content)
            .map_err(|e| ArenaError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Resolve the service base URL: explicit value, then the environment,
    /// then the config file, then [`DEFAULT_BASE_URL`].
    pub fn base_url(&self, explicit: Option<&str>, env_value: Option<&str>) -> String {
        [explicit, env_value, self.service.base_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string()
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}
