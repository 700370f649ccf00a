//! Harness configuration
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional `config.json`, and whatever the caller overrides (usually
//! command-line flags). Every field in the file is optional.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::{ConnectionConfig, Pacing};

/// Directory under the platform config dir holding `config.json`
pub const CONFIG_DIR_NAME: &str = "desuart";

/// File name of the harness configuration
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Errors while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid config JSON
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Pacing overrides; unset fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    /// See [`Pacing::settle_delay_ms`](crate::protocol::Pacing::settle_delay_ms)
    pub settle_delay_ms: Option<u64>,
    /// See [`Pacing::inter_write_delay_ms`](crate::protocol::Pacing::inter_write_delay_ms)
    pub inter_write_delay_ms: Option<u64>,
    /// See [`Pacing::processing_delay_ms`](crate::protocol::Pacing::processing_delay_ms)
    pub processing_delay_ms: Option<u64>,
}

/// Serial and pacing settings as stored in `config.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Serial port name
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: Option<u32>,
    /// Response timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Delays around each exchange
    pub pacing: PacingSettings,
}

impl HarnessConfig {
    /// Default config file location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: HarnessConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load `path` if given, otherwise the default location if it exists.
    ///
    /// A missing default file is not an error; an explicitly named one is.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(default) if default.is_file() => Self::load(default),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Overlay `other` on top of `self`; set fields in `other` win
    pub fn merge(mut self, other: HarnessConfig) -> Self {
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.baud_rate.is_some() {
            self.baud_rate = other.baud_rate;
        }
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.pacing.settle_delay_ms.is_some() {
            self.pacing.settle_delay_ms = other.pacing.settle_delay_ms;
        }
        if other.pacing.inter_write_delay_ms.is_some() {
            self.pacing.inter_write_delay_ms = other.pacing.inter_write_delay_ms;
        }
        if other.pacing.processing_delay_ms.is_some() {
            self.pacing.processing_delay_ms = other.pacing.processing_delay_ms;
        }
        self
    }

    /// Fill unset fields with defaults
    pub fn to_connection_config(&self) -> ConnectionConfig {
        let defaults = ConnectionConfig::default();
        let pacing = Pacing {
            settle_delay_ms: self
                .pacing
                .settle_delay_ms
                .unwrap_or(defaults.pacing.settle_delay_ms),
            inter_write_delay_ms: self
                .pacing
                .inter_write_delay_ms
                .unwrap_or(defaults.pacing.inter_write_delay_ms),
            processing_delay_ms: self
                .pacing
                .processing_delay_ms
                .unwrap_or(defaults.pacing.processing_delay_ms),
        };
        ConnectionConfig {
            port_name: self.port.clone().unwrap_or(defaults.port_name),
            baud_rate: self.baud_rate.unwrap_or(defaults.baud_rate),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            pacing,
        }
    }
}
