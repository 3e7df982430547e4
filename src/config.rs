//! Startup configuration
//!
//! One TOML file holds the broker connection, device preference, streaming mode and
//! initial channel mappings. A missing file is created with defaults; a malformed one
//! is reported rather than silently replaced.

use crate::mapping::{FieldMapping, MappingTable};
use crate::mqtt::config::MqttConfig;
use crate::streaming::config::StreamingConfig;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/padstream";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "PADSTREAM_CONFIG";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Case-insensitive substring of the gamepad name; first gamepad if unset
    pub preferred_name: Option<String>,
    pub sample_interval_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            preferred_name: None,
            sample_interval_ms: 16,
        }
    }
}

impl DeviceConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Start streaming as soon as broker and device are ready
    pub auto_start: bool,
    pub mqtt: MqttConfig,
    pub device: DeviceConfig,
    pub streaming: StreamingConfig,
    pub mappings: Vec<FieldMapping>,
}

impl AppConfig {
    /// `$PADSTREAM_CONFIG`, or `~/.config/padstream/config.toml`
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Writes a default config at `path` if nothing is there yet
    pub async fn ensure_default_config(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        AppConfig::default().save(path).await
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::parse(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config.normalized())
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;
        Ok(())
    }

    /// Clamps out-of-range values and collapses empty or duplicate mappings
    pub fn normalized(self) -> Self {
        let table = MappingTable::from_entries(self.mappings.iter().cloned());
        if table.len() != self.mappings.len() {
            warn!(
                "Dropped {} empty or duplicate mappings from config",
                self.mappings.len() - table.len()
            );
        }
        let clamped = self.streaming.clamped();
        if clamped != self.streaming {
            warn!(
                "send_hz {} out of range, clamped to {}",
                self.streaming.send_hz, clamped.send_hz
            );
        }

        Self {
            streaming: clamped,
            mappings: table.iter().cloned().collect(),
            device: DeviceConfig {
                sample_interval_ms: self.device.sample_interval_ms.max(1),
                ..self.device
            },
            ..self
        }
    }

    pub fn mapping_table(&self) -> MappingTable {
        MappingTable::from_entries(self.mappings.iter().cloned())
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
