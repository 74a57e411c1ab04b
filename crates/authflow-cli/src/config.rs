//! CLI configuration management.
//!
//! Holds the credential service URL, the last username that reached the
//! dashboard, an optional log directory and the engine tuning knobs.
//!
//! Configuration is stored at `~/.config/authflow/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use authflow_core::EngineConfig;
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "authflow";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Overrides `service_url`
const ENV_SERVICE_URL: &str = "AUTHFLOW_SERVICE_URL";

/// Overrides `last_username`
const ENV_USERNAME: &str = "AUTHFLOW_USERNAME";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub service_url: Option<String>,
    pub last_username: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `AUTHFLOW_*` environment variables on top of the file
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_SERVICE_URL).ok(),
            std::env::var(ENV_USERNAME).ok(),
        )
    }

    fn with_overrides(mut self, service_url: Option<String>, username: Option<String>) -> Self {
        if let Some(url) = service_url.filter(|url| !url.trim().is_empty()) {
            self.service_url = Some(url);
        }
        if let Some(name) = username.filter(|name| !name.trim().is_empty()) {
            self.last_username = Some(name);
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
