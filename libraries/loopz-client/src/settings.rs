//! Player and gateway configuration
//!
//! Loaded from an optional TOML file, then overridden by `LOOPZ_`-prefixed
//! environment variables. Nested keys use a double underscore:
//! `LOOPZ_GATEWAY__BASE_URL`, `LOOPZ_PLAYER__DEFAULT_VOLUME`.

use crate::error::{ClientError, Result};
use loopz_playback::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_RECOMMENDATIONS_PATH: &str = "/api/canciones/{id}/recomendaciones";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LoopzConfig {
    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub gateway: GatewaySettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GatewaySettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path template; `{id}` is replaced by the track id
    #[serde(default = "default_recommendations_path")]
    pub recommendations_path: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Bearer token sent with every request
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            recommendations_path: default_recommendations_path(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            access_token: None,
        }
    }
}

impl GatewaySettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Check the settings can produce request URLs
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ClientError::InvalidUrl("URL cannot be empty".into()));
        }
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }
        url::Url::parse(base).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        if !self.recommendations_path.contains("{id}") {
            return Err(ClientError::Config(
                "recommendations_path must contain {id}".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ClientError::Config("timeout_secs must be positive".into()));
        }

        Ok(())
    }
}

impl LoopzConfig {
    /// Load from `loopz.toml` in the working directory (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("loopz.toml"))
    }

    /// Load from `path` (if it exists) and the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = config::Config::builder();

        if path.exists() {
            debug!(path = %path.display(), "Loading config file");
            settings = settings.add_source(config::File::from(path));
        }

        // Override with environment variables (prefixed with LOOPZ_)
        settings = settings.add_source(
            config::Environment::with_prefix("LOOPZ")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.player.default_volume) {
            return Err(ClientError::Config(
                "player.default_volume must be between 0.0 and 1.0".into(),
            ));
        }
        self.gateway.validate()
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_recommendations_path() -> String {
    DEFAULT_RECOMMENDATIONS_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    5
}
