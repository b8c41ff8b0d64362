//! Device logic for the response box, shared by the firmware and the host tool.
//!
//! The crate is `no_std` so it runs on the ATmega32U4 firmware unchanged,
//! while the host CLI reuses the command bytes, mapping rules and snapshot
//! framing from the same source. Hardware is reached only through the traits
//! in [`hal`].
//!
//! - [`debounce`], [`capacitive`]: raw input to stable state plus edges
//! - [`clock`]: resettable microsecond clock and the periodic render trigger
//! - [`state`]: composite snapshot and change detection
//! - [`protocol`]: single-byte serial commands
//! - [`output`]: keystrokes and snapshot lines
//! - [`report`]: HID keyboard reports for the held symbols
//! - [`device`]: the control loop tying it all together

#![cfg_attr(not(test), no_std)]

pub mod capacitive;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod device;
pub mod hal;
pub mod keycode;
pub mod keymap;
pub mod output;
pub mod protocol;
pub mod report;
pub mod state;

#[cfg(test)]
mod testing;

/// Number of mechanical buttons.
pub const NUM_BUTTONS: usize = 4;
/// Mapping slots: one per button plus the home channel.
pub const NUM_SLOTS: usize = NUM_BUTTONS + 1;

pub use capacitive::CapacitiveDebouncer;
pub use clock::{PeriodicTimer, ResetClock};
pub use config::{ConfigError, DeviceConfig, TouchConfig};
pub use debounce::{Debouncer, Edge};
pub use device::Device;
pub use hal::{Keyboard, Sensors, SerialLink, TimeSource};
pub use keycode::Keycode;
pub use keymap::{Channel, KeyMapping};
pub use output::SnapshotFormat;
pub use protocol::Command;
pub use report::{HeldKeys, KeyboardReport, ReportTracker};
pub use state::{HomeRetrigger, KeyState};
