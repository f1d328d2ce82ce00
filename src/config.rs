//! Configuration handling for the WireGuard action

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Default file name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "wg-action.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Interface name; also the stem of the config file
    pub interface: String,
    /// Directory `wg-quick` reads configs from
    pub config_dir: PathBuf,
    /// Packages installed before the tunnel comes up
    pub packages: Vec<String>,
    /// Where the config is staged before being moved into place
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            interface: "wg0".to_string(),
            config_dir: PathBuf::from("/etc/wireguard"),
            packages: vec![
                "wireguard".to_string(),
                "wireguard-tools".to_string(),
                "resolvconf".to_string(),
            ],
            staging_dir: None,
        }
    }
}

impl ActionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ActionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from an explicit path, else the first default location that
    /// exists, else built-in defaults.
    ///
    /// Search order: `./wg-action.toml`, then `<config dir>/wg-action/config.toml`.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!("Loading config from {}", path.display());
            return Self::load(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            debug!("Loading config from {}", local.display());
            return Self::load(&local);
        }

        if let Some(dir) = dirs::config_dir() {
            let user_config = dir.join("wg-action").join("config.toml");
            if user_config.exists() {
                debug!("Loading config from {}", user_config.display());
                return Self::load(&user_config);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Path of the tunnel config: `<config_dir>/<interface>.conf`
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.conf", self.interface))
    }

    /// Staging directory, falling back to `RUNNER_TEMP` and then the OS temp dir
    pub fn staging_dir(&self) -> PathBuf {
        if let Some(dir) = &self.staging_dir {
            return dir.clone();
        }
        match std::env::var_os("RUNNER_TEMP") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir(),
        }
    }
}
