//! Plugin configuration management

use crate::payload::OutOfRangePolicy;
use crate::plugin::PluginOptions;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub plugin: PluginSettings,
    #[serde(default)]
    pub usb: UsbSettings,
    #[serde(default)]
    pub payload: PayloadSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "PluginSettings::default_log_level")]
    pub log_level: String,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl PluginSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbSettings {
    /// Detach a bound kernel driver (e.g. `usblp`) before claiming the interface
    #[serde(default = "UsbSettings::default_force_detach")]
    pub force_detach_kernel_driver: bool,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            force_detach_kernel_driver: Self::default_force_detach(),
        }
    }
}

impl UsbSettings {
    fn default_force_detach() -> bool {
        true
    }
}

/// Print data conversion settings
///
/// ```toml
/// [payload]
/// out_of_range = "truncate"  # keep the low 8 bits of values outside -128..=255
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadSettings {
    #[serde(default)]
    pub out_of_range: OutOfRangePolicy,
}

impl PluginConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned())
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usb-printer/config.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: PluginConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-printer").join("config.toml")
        } else {
            PathBuf::from(".config/usb-printer/config.toml")
        }
    }

    /// Options the plugin is built with
    pub fn plugin_options(&self) -> PluginOptions {
        PluginOptions {
            force_detach: self.usb.force_detach_kernel_driver,
            out_of_range: self.payload.out_of_range,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_log_level(&self.plugin.log_level)
    }
}

/// Check a log level name
pub fn validate_log_level(level: &str) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&level) {
        return Err(anyhow!(
            "Invalid log level '{}', must be one of: {}",
            level,
            valid_levels.join(", ")
        ));
    }
    Ok(())
}
