//! Interfaces to the board.
//!
//! Pin sampling, touch sensing, the serial transport and the keystroke
//! transport all live outside this crate. The firmware implements these
//! traits on top of its registers; tests implement them with fakes.

use crate::NUM_BUTTONS;

/// Free-running microsecond counter. Wraps at the `u32` range.
pub trait TimeSource {
    fn micros(&mut self) -> u32;
}

/// Reliable, ordered byte stream to the host.
pub trait SerialLink: core::fmt::Write {
    /// Next pending byte, or `None` if nothing has arrived. Never blocks.
    fn read_byte(&mut self) -> Option<u8>;
}

/// Keystroke transport. Symbols are the ASCII characters held in a
/// [`KeyMapping`](crate::KeyMapping).
pub trait Keyboard {
    fn press(&mut self, symbol: u8);
    fn release(&mut self, symbol: u8);
}

/// Raw channel readings. `true` means the switch is closed.
pub trait Sensors {
    fn read_buttons(&mut self) -> [bool; NUM_BUTTONS];
    /// Capacitive intensity in arbitrary units; larger means more coupling.
    fn read_intensity(&mut self) -> f32;
}
