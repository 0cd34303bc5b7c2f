//! Configuration for the ergodesk agent.

use crate::core::{ErgonomicTargets, DEFAULT_MARGIN_CM, DEFAULT_SITTING_ALERT_SECS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the desk backend
    pub backend_url: String,

    /// CSRF token for mutating backend calls
    pub csrf_token: String,

    /// The user's body height in cm, used to derive ergonomic targets
    pub user_height_cm: u32,

    /// Tolerance band around each target height, in cm
    pub margin_cm: i64,

    /// Seconds of continuous sitting before the stand-up reminder fires
    pub sitting_alert_secs: u32,

    /// Whether ergonomic recommendations are shown at all
    pub recommendations_enabled: bool,

    /// Seconds between live status refreshes of the selected desk in watch
    /// mode
    pub status_refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            csrf_token: String::new(),
            user_height_cm: 176,
            margin_cm: DEFAULT_MARGIN_CM,
            sitting_alert_secs: DEFAULT_SITTING_ALERT_SECS,
            recommendations_enabled: true,
            status_refresh_secs: 3,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ergodesk-agent")
            .join("config.json")
    }

    /// Derive the ergonomic targets for the configured user.
    pub fn targets(&self) -> ErgonomicTargets {
        ErgonomicTargets::for_body_height(self.user_height_cm).with_margin(self.margin_cm)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
