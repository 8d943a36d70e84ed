use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::settings::{PRODUCT_ID, VENDOR_ID};
use crate::profiles::ProfileConfig;
use crate::state::{LED_FADE, LED_HOLD};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub display: DisplayConfig,
    pub leds: LedConfig,
    pub profiles: Vec<ProfileConfig>,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;
        Ok(())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")?;
        Ok(PathBuf::from(home).join(".config/inkkeys/config.toml"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial port, auto-detected by USB id when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PathBuf>,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Wait for the info block after connecting
    pub info_timeout_ms: u64,
    /// Wait for each display refresh acknowledgement
    pub refresh_timeout_ms: u64,
    /// Pause between connection attempts
    pub retry_interval_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            info_timeout_ms: 5000,
            refresh_timeout_ms: 10_000,
            retry_interval_ms: 3000,
        }
    }
}

impl DeviceConfig {
    pub fn info_timeout(&self) -> Duration {
        Duration::from_millis(self.info_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// TrueType font for labels, labels are skipped without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<PathBuf>,
    /// Use full refreshes when switching profiles
    pub full_refresh: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    /// Full brightness after a colour change
    pub hold_ms: u64,
    /// Fade-out that follows
    pub fade_ms: u64,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            hold_ms: LED_HOLD.as_millis() as u64,
            fade_ms: LED_FADE.as_millis() as u64,
        }
    }
}

impl LedConfig {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }
}
