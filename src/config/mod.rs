//! Configuration management for Text Scaler
//!
//! Handles loading, parsing, and validation of the YAML configuration file.
//! Every field has a default, so an empty file yields the text-scaling profile.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::mapper::ValueRange;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub value: ValueConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub devices: DevicesConfig,
}

/// Bounds, default and display precision of the adjustable value
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ValueConfig {
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    #[serde(default = "default_value")]
    pub default: f64,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    #[serde(default = "default_scroll_step")]
    pub scroll_step: f64,
    /// Reject committed text outside `[min, max]` instead of clamping it
    #[serde(default)]
    pub reject_out_of_range_text: bool,
}

/// When a UI-driven change is written to the settings store
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Slider and scroll changes are written immediately, as well as commits
    #[default]
    EveryChange,
    /// Only explicit commits (text entry, reset, apply) are written
    CommitOnly,
}

/// Controller timing and write policy
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SyncConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub write_mode: WriteMode,
}

/// Settings store backend
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsBackend {
    /// In-process store, nothing leaves the process
    #[default]
    Memory,
    /// `gsettings` command-line tool
    Gsettings,
}

/// Settings store location
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SettingsConfig {
    #[serde(default)]
    pub backend: SettingsBackend,
    #[serde(default = "default_schema_id")]
    pub schema_id: String,
    #[serde(default = "default_key")]
    pub key: String,
}

/// External monitor control commands
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DevicesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_discover_command")]
    pub discover_command: Vec<String>,
    /// Token identifying device lines in the discovery output (case-insensitive)
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Apply command; `{device}` and `{value}` are substituted per push
    #[serde(default = "default_push_command")]
    pub push_command: Vec<String>,
    #[serde(default = "default_level_min")]
    pub level_min: i64,
    #[serde(default = "default_level_max")]
    pub level_max: i64,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Brightness profile: integer percentage, default 0, scroll step 5
    pub fn brightness() -> Self {
        let range = ValueRange::brightness();
        Self {
            value: ValueConfig {
                min: range.min(),
                max: range.max(),
                default: range.default_value(),
                decimals: range.decimals(),
                scroll_step: 5.0,
                reject_out_of_range_text: false,
            },
            ..Self::default()
        }
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        self.value
            .range()
            .context("Invalid value range")?;

        if !self.value.scroll_step.is_finite() || self.value.scroll_step <= 0.0 {
            anyhow::bail!(
                "value.scroll_step must be a positive number (got {})",
                self.value.scroll_step
            );
        }

        if self.settings.schema_id.is_empty() {
            anyhow::bail!("settings.schema_id cannot be empty");
        }
        if self.settings.key.is_empty() {
            anyhow::bail!("settings.key cannot be empty");
        }

        self.devices.validate().context("Invalid devices section")?;

        Ok(())
    }
}

impl ValueConfig {
    /// Build the validated range; fails for degenerate bounds
    pub fn range(&self) -> crate::Result<ValueRange> {
        ValueRange::new(self.min, self.max, self.default, self.decimals)
    }
}

impl SyncConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl DevicesConfig {
    /// Integer range accepted by the apply command
    pub fn levels(&self) -> RangeInclusive<i64> {
        self.level_min..=self.level_max
    }

    fn validate(&self) -> Result<()> {
        if self.level_min >= self.level_max {
            anyhow::bail!(
                "level_min ({}) must be less than level_max ({})",
                self.level_min,
                self.level_max
            );
        }

        // Commands are only needed when hardware control is on
        if !self.enabled {
            return Ok(());
        }

        if self.discover_command.is_empty() {
            anyhow::bail!("discover_command cannot be empty");
        }
        if self.push_command.is_empty() {
            anyhow::bail!("push_command cannot be empty");
        }
        if self.marker.trim().is_empty() {
            anyhow::bail!("marker cannot be empty");
        }
        for placeholder in ["{device}", "{value}"] {
            if !self.push_command.iter().any(|arg| arg.contains(placeholder)) {
                anyhow::bail!("push_command must contain a {} placeholder", placeholder);
            }
        }

        Ok(())
    }
}

impl Default for ValueConfig {
    fn default() -> Self {
        let range = ValueRange::text_scaling();
        Self {
            min: range.min(),
            max: range.max(),
            default: range.default_value(),
            decimals: range.decimals(),
            scroll_step: default_scroll_step(),
            reject_out_of_range_text: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            write_mode: WriteMode::default(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            backend: SettingsBackend::default(),
            schema_id: default_schema_id(),
            key: default_key(),
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            discover_command: default_discover_command(),
            marker: default_marker(),
            push_command: default_push_command(),
            level_min: default_level_min(),
            level_max: default_level_max(),
        }
    }
}

// Default value functions
fn default_min() -> f64 { ValueRange::text_scaling().min() }
fn default_max() -> f64 { ValueRange::text_scaling().max() }
fn default_value() -> f64 { ValueRange::text_scaling().default_value() }
fn default_decimals() -> u32 { ValueRange::text_scaling().decimals() }
fn default_scroll_step() -> f64 { 0.1 }
fn default_debounce_ms() -> u64 { crate::debounce::DEFAULT_DEBOUNCE_MS }
fn default_schema_id() -> String { "org.gnome.desktop.interface".to_string() }
fn default_key() -> String { "text-scaling-factor".to_string() }
fn default_true() -> bool { true }
fn default_marker() -> String { "Device:".to_string() }
fn default_level_min() -> i64 { 0 }
fn default_level_max() -> i64 { 100 }

fn default_discover_command() -> Vec<String> {
    ["sudo", "ddccontrol", "-p"].iter().map(|s| s.to_string()).collect()
}

fn default_push_command() -> Vec<String> {
    ["sudo", "ddccontrol", "{device}", "-r", "0x10", "-w", "{value}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
