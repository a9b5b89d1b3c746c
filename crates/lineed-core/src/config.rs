//! Editor configuration.
//!
//! ## Learning: Serde for Serialization
//!
//! `#[derive(Serialize, Deserialize)]` generates the TOML mapping, and
//! `#[serde(default)]` fills in every field a config file leaves out, so an
//! empty file is a valid config.

use std::path::{Path, PathBuf};

use lineed_buffer::BufferConfig;
use serde::{Deserialize, Serialize};

/// Main editor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scratch storage settings
    pub buffer: BufferConfig,

    /// Editor behavior settings
    pub editor: EditorConfig,
}

impl Config {
    /// Loads config from the default location.
    pub fn load() -> Self {
        Self::load_from_default_path().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "using default config");
            Self::default()
        })
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads from the default config path.
    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("lineed").join("config.toml"))
    }
}

/// Editor behavior configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Shown before each command is read; empty means no prompt
    pub prompt: String,

    /// Print the message after `?` instead of waiting to be asked
    pub verbose_errors: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            verbose_errors: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
