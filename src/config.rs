//! # Application Configuration
//!
//! Loads the TOML configuration for the viewer from
//! `<config dir>/sirambro/config.toml`, or from the path in `SIRAMBRO_CONFIG`.
//! A missing file is replaced by the defaults, which are written back so the user
//! has something to edit. Every section has defaults, so a partial file is fine.

use crate::mqtt::config::MqttConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "sirambro";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "SIRAMBRO_CONFIG";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub ui: UiConfig,
}

/// Window settings for the dashboard.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub title: String,
    pub fullscreen: bool,
    /// Repaint interval while idle
    pub refresh_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "SiramBro".to_string(),
            fullscreen: false,
            refresh_ms: 100,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid broker endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No config directory available on this system")]
    NoConfigDir,
}

impl AppConfig {
    /// Resolves the config path: `SIRAMBRO_CONFIG` wins over the platform config dir.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        // Endpoint früh prüfen, nicht erst beim Verbinden
        config.mqtt.endpoint()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads the config at `path`, writing the defaults first if it does not exist.
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !tokio::fs::try_exists(path).await? {
            warn!("No config found at {}, writing defaults", path.display());
            let config = AppConfig::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        debug!("Config: {:?}", config);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_toml()?).await?;
        info!("Config written to {}", path.display());
        Ok(())
    }
}
