//! Compiled-in device configuration.
//!
//! There is no persistent storage: every power-up starts from
//! [`DeviceConfig::default`]. The `serde` feature lets the host tool share
//! the same types for its own settings file.

use thiserror::Error;

use crate::output::SnapshotFormat;
use crate::state::HomeRetrigger;

/// Debounce window for the mechanical buttons.
pub const BUTTON_DEBOUNCE_US: u32 = 10_000;
/// Snapshot cadence.
pub const RENDER_PERIOD_US: u32 = 10_000;
/// How long `L` waits for its payload.
pub const REMAP_TIMEOUT_US: u32 = 1_000_000;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("render period must be non-zero")]
    ZeroRenderPeriod,
    #[error("{name} weight {value} is outside (0, 1]")]
    Weight { name: &'static str, value: f32 },
    #[error("{name} margin must be positive, got {value}")]
    Margin { name: &'static str, value: f32 },
}

/// Capacitive channel tuning. Intensities are in sensor units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TouchConfig {
    pub debounce_us: u32,
    /// Per-sample weight of the noise filter.
    pub filter_weight: f32,
    /// Per-sample weight of the running average.
    pub average_weight: f32,
    pub press_margin: f32,
    pub release_margin: f32,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            debounce_us: 5_000,
            filter_weight: 0.5,
            average_weight: 0.01,
            press_margin: 15.0,
            release_margin: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    pub button_debounce_us: u32,
    pub touch: TouchConfig,
    pub render_period_us: u32,
    pub remap_timeout_us: u32,
    pub snapshot_format: SnapshotFormat,
    pub home_retrigger: HomeRetrigger,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            button_debounce_us: BUTTON_DEBOUNCE_US,
            touch: TouchConfig::default(),
            render_period_us: RENDER_PERIOD_US,
            remap_timeout_us: REMAP_TIMEOUT_US,
            snapshot_format: SnapshotFormat::Fields,
            home_retrigger: HomeRetrigger::Suppress,
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_period_us == 0 {
            return Err(ConfigError::ZeroRenderPeriod);
        }
        check_weight("filter", self.touch.filter_weight)?;
        check_weight("average", self.touch.average_weight)?;
        check_margin("press", self.touch.press_margin)?;
        check_margin("release", self.touch.release_margin)?;
        Ok(())
    }
}

fn check_weight(name: &'static str, value: f32) -> Result<(), ConfigError> {
    // Written so that NaN fails too
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Weight { name, value })
    }
}

fn check_margin(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Margin { name, value })
    }
}
