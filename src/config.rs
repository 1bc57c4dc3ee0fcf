//! Configuration loading and management
//!
//! Handles parsing of `.taskdeck.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up at the data root
pub const CONFIG_FILE: &str = ".taskdeck.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Store limits and persistence settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Data-loss guard thresholds
    #[serde(default)]
    pub guard: GuardConfig,
}

/// Store limits and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of tags per task
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,

    /// Lowest allowed priority value
    #[serde(default = "default_priority_min")]
    pub priority_min: u8,

    /// Highest allowed priority value
    #[serde(default = "default_priority_max")]
    pub priority_max: u8,

    /// Number of rotated backup files to retain
    #[serde(default = "default_backup_count")]
    pub backup_count: usize,

    /// JSON indentation width on disk (0 writes compact JSON)
    #[serde(default = "default_indent")]
    pub indent: usize,
}

fn default_max_tags() -> usize {
    3
}

fn default_priority_min() -> u8 {
    1
}

fn default_priority_max() -> u8 {
    3
}

fn default_backup_count() -> usize {
    3
}

fn default_indent() -> usize {
    2
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_tags: default_max_tags(),
            priority_min: default_priority_min(),
            priority_max: default_priority_max(),
            backup_count: default_backup_count(),
            indent: default_indent(),
        }
    }
}

/// Thresholds for the save-time data-loss guard
///
/// These are policy heuristics, not contracts: a save that drops every task
/// or shrinks the collection past `shrink_ratio` from at least
/// `min_previous` tasks triggers a warning but still proceeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Warn when the task count drops by more than this fraction
    #[serde(default = "default_shrink_ratio")]
    pub shrink_ratio: f64,

    /// Minimum previous count before the shrink check applies
    #[serde(default = "default_min_previous")]
    pub min_previous: usize,
}

fn default_shrink_ratio() -> f64 {
    0.5
}

fn default_min_previous() -> usize {
    4
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            shrink_ratio: default_shrink_ratio(),
            min_previous: default_min_previous(),
        }
    }
}

impl Config {
    /// Load configuration from a `.taskdeck.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        self.store.validate()?;
        self.guard.validate()?;
        Ok(())
    }
}

impl StoreConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.max_tags == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "store.max_tags must be at least 1".to_string(),
            ));
        }
        if self.priority_min > self.priority_max {
            return Err(crate::error::Error::InvalidConfig(format!(
                "store.priority_min ({}) exceeds store.priority_max ({})",
                self.priority_min, self.priority_max
            )));
        }
        Ok(())
    }
}

impl GuardConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if !(self.shrink_ratio > 0.0 && self.shrink_ratio <= 1.0) {
            return Err(crate::error::Error::InvalidConfig(format!(
                "guard.shrink_ratio must be in (0, 1], got {}",
                self.shrink_ratio
            )));
        }
        Ok(())
    }
}
