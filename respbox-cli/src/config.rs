//! Host-side settings.
//!
//! Read from `<config dir>/respbox/config.toml` (for example
//! `~/.config/respbox/config.toml` on Linux) unless `--config` names another
//! file. A missing default file means defaults; any key may be omitted.
//!
//! ```toml
//! port = "/dev/ttyACM0"
//! baud_rate = 115200
//! read_timeout_ms = 1500
//! sync_rounds = 20
//! snapshot_format = "fields"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use respbox_core::SnapshotFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("reading config: {0}")]
    Io(#[from] io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("sync_rounds must be at least 1")]
    NoSyncRounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Serial port name; `--port` overrides it.
    pub port: Option<String>,
    pub baud_rate: u32,
    /// How long to wait for a command reply.
    pub read_timeout_ms: u64,
    pub sync_rounds: u32,
    /// Framing the connected firmware was built with.
    pub snapshot_format: SnapshotFormat,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            // The remap reply can take the device's full 1 s payload wait
            read_timeout_ms: 1_500,
            sync_rounds: 20,
            snapshot_format: SnapshotFormat::Fields,
        }
    }
}

/// Default location of the config file. Does not create anything.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join("respbox").join("config.toml"))
}

impl HostConfig {
    /// Load the default file, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load a specific file; it must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(contents)?;
        if config.sync_rounds == 0 {
            return Err(ConfigError::NoSyncRounds);
        }
        Ok(config)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
