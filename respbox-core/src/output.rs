//! The two outputs: keystrokes on every edge, snapshot lines on change.
//!
//! Snapshot framing is fixed per deployment:
//!
//! ```text
//!   Bitmask:  "<hex button mask> <elapsed us>\n"        e.g. "4 120034"
//!   Fields:   "<b0> <b1> .. <bN-1> <home> <elapsed us>\n" e.g. "0 0 1 0 0 120034"
//! ```

use core::fmt::{self, Write};

use crate::clock::PeriodicTimer;
use crate::debounce::Edge;
use crate::hal::Keyboard;
use crate::keymap::{Channel, KeyMapping};
use crate::state::KeyState;
use crate::NUM_SLOTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SnapshotFormat {
    /// Hex mask of the buttons (home not included) and the timestamp.
    Bitmask,
    /// Every channel as `0`/`1`, home last, then the timestamp.
    Fields,
}

/// Render one snapshot line.
pub fn write_snapshot<W: Write>(
    out: &mut W,
    state: &KeyState,
    format: SnapshotFormat,
) -> fmt::Result {
    match format {
        SnapshotFormat::Bitmask => writeln!(out, "{:X} {}", state.bitmask(), state.timestamp),
        SnapshotFormat::Fields => {
            for &pressed in &state.keys {
                write!(out, "{} ", u8::from(pressed))?;
            }
            writeln!(out, "{} {}", u8::from(state.home), state.timestamp)
        }
    }
}

pub struct Emitter {
    format: SnapshotFormat,
    timer: PeriodicTimer,
    /// Symbol sent on each channel's last key-down, so the key-up matches
    /// even if the mapping changed in between.
    held: [Option<u8>; NUM_SLOTS],
}

impl Emitter {
    pub fn new(format: SnapshotFormat, period_us: u32, now: u32) -> Self {
        Self {
            format,
            timer: PeriodicTimer::new(period_us, now),
            held: [None; NUM_SLOTS],
        }
    }

    /// Emit the key action for one edge, right away.
    pub fn keystroke<K: Keyboard>(
        &mut self,
        keyboard: &mut K,
        mapping: &KeyMapping,
        channel: Channel,
        edge: Edge,
    ) {
        let slot = channel.slot();
        match edge {
            Edge::Press => {
                let symbol = mapping.symbol(channel);
                keyboard.press(symbol);
                self.held[slot] = Some(symbol);
            }
            Edge::Release => {
                let symbol = self.held[slot].take().unwrap_or_else(|| mapping.symbol(channel));
                keyboard.release(symbol);
            }
        }
    }

    /// True when the render period has elapsed (free-running ticks).
    pub fn due(&mut self, ticks: u32) -> bool {
        self.timer.poll(ticks)
    }

    /// Write the snapshot line, but only if the state changed.
    pub fn render<W: Write>(&self, out: &mut W, state: &KeyState) -> fmt::Result {
        if state.changed {
            write_snapshot(out, state, self.format)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{KeyAction, RecordingKeyboard};

    fn state(keys: [bool; 4], home: bool, timestamp: u32) -> KeyState {
        KeyState {
            keys,
            home,
            changed: true,
            timestamp,
        }
    }

    #[test]
    fn test_bitmask_line() {
        let mut out = String::new();
        let one_down = state([false, false, true, false], true, 120_034);
        write_snapshot(&mut out, &one_down, SnapshotFormat::Bitmask).unwrap();
        assert_eq!(out, "4 120034\n");

        out.clear();
        let all_down = state([true; 4], false, 7);
        write_snapshot(&mut out, &all_down, SnapshotFormat::Bitmask).unwrap();
        assert_eq!(out, "F 7\n");
    }

    #[test]
    fn test_fields_line() {
        let mut out = String::new();
        let one_down = state([false, false, true, false], true, 5);
        write_snapshot(&mut out, &one_down, SnapshotFormat::Fields).unwrap();
        assert_eq!(out, "0 0 1 0 1 5\n");
    }

    #[test]
    fn test_unchanged_state_renders_nothing() {
        let emitter = Emitter::new(SnapshotFormat::Fields, 10_000, 0);
        let mut out = String::new();
        let mut quiet = state([true, false, false, false], false, 1);
        quiet.changed = false;
        emitter.render(&mut out, &quiet).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_release_uses_symbol_that_was_pressed() {
        let mut emitter = Emitter::new(SnapshotFormat::Fields, 10_000, 0);
        let mut keyboard = RecordingKeyboard::default();
        let mut mapping = KeyMapping::default();

        let second = Channel::button(1).unwrap();
        emitter.keystroke(&mut keyboard, &mapping, second, Edge::Press);
        mapping.apply(b"abcd");
        emitter.keystroke(&mut keyboard, &mapping, second, Edge::Release);
        emitter.keystroke(&mut keyboard, &mapping, Channel::HOME, Edge::Press);

        assert_eq!(
            keyboard.actions,
            vec![KeyAction::Press(b'x'), KeyAction::Release(b'x'), KeyAction::Press(b'_')]
        );
    }
}
