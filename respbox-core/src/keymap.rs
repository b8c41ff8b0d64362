//! Output symbol per channel.
//!
//! One slot per button in physical order, then the home slot. The mapping is
//! rebuilt from [`DEFAULT_SYMBOLS`] at every start-up and only the `L`
//! command changes it afterwards.

use core::fmt;

use crate::{NUM_BUTTONS, NUM_SLOTS};

/// Power-on mapping: buttons `w x y z`, home `_`.
pub const DEFAULT_SYMBOLS: [u8; NUM_SLOTS] = *b"wxyz_";

/// An input source, addressed by its mapping slot: buttons in physical
/// order, then home. Only in-range slots can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel(usize);

impl Channel {
    pub const HOME: Channel = Channel(NUM_BUTTONS);

    /// `None` past the last button.
    pub const fn button(index: usize) -> Option<Channel> {
        if index < NUM_BUTTONS {
            Some(Channel(index))
        } else {
            None
        }
    }

    /// Button channels in index order.
    pub fn buttons() -> impl Iterator<Item = Channel> {
        (0..NUM_BUTTONS).map(Channel)
    }

    /// Button index, `None` for home.
    pub fn button_index(self) -> Option<usize> {
        (self.0 < NUM_BUTTONS).then_some(self.0)
    }

    /// Mapping slot for this channel, always below `NUM_SLOTS`.
    pub fn slot(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMapping {
    symbols: [u8; NUM_SLOTS],
}

/// What a remap payload did to the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemapOutcome {
    pub accepted: usize,
    pub rejected: usize,
    /// Slots the payload never reached.
    pub missing: usize,
}

/// Symbols a remap may install: ASCII `[0-9A-Za-z]`.
pub fn is_valid_symbol(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

impl Default for KeyMapping {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS,
        }
    }
}

impl KeyMapping {
    pub fn symbol(&self, channel: Channel) -> u8 {
        self.symbols[channel.slot()]
    }

    /// Install `payload` slot by slot. Invalid bytes leave their slot alone;
    /// a short payload leaves the trailing slots alone. Bytes past the last
    /// slot are ignored.
    pub fn apply(&mut self, payload: &[u8]) -> RemapOutcome {
        let mut outcome = RemapOutcome {
            missing: NUM_SLOTS.saturating_sub(payload.len()),
            ..RemapOutcome::default()
        };
        for (slot, &byte) in self.symbols.iter_mut().zip(payload) {
            if is_valid_symbol(byte) {
                *slot = byte;
                outcome.accepted += 1;
            } else {
                outcome.rejected += 1;
            }
        }
        outcome
    }
}

impl fmt::Display for KeyMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &symbol in &self.symbols {
            write!(f, "{}", symbol as char)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let mapping = KeyMapping::default();
        assert_eq!(Channel::button(0).map(|c| mapping.symbol(c)), Some(b'w'));
        assert_eq!(Channel::button(3).map(|c| mapping.symbol(c)), Some(b'z'));
        assert_eq!(mapping.symbol(Channel::HOME), b'_');
        assert_eq!(mapping.to_string(), "wxyz_");
    }

    #[test]
    fn test_button_index_out_of_range() {
        assert_eq!(Channel::button(NUM_BUTTONS), None);
        assert_eq!(Channel::button(usize::MAX), None);
        assert_eq!(Channel::HOME.button_index(), None);
        assert_eq!(Channel::HOME.slot(), NUM_SLOTS - 1);

        let slots: Vec<usize> = Channel::buttons().map(Channel::slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
        assert!(Channel::buttons().all(|c| c.button_index() == Some(c.slot())));
    }

    #[test]
    fn test_full_valid_payload() {
        let mut mapping = KeyMapping::default();
        let outcome = mapping.apply(b"abcdH");
        assert_eq!(outcome, RemapOutcome { accepted: 5, rejected: 0, missing: 0 });
        assert_eq!(mapping.to_string(), "abcdH");
    }

    #[test]
    fn test_all_invalid_payload_is_idempotent() {
        let mut mapping = KeyMapping::default();
        mapping.apply(b"q1");
        let before = mapping;
        let outcome = mapping.apply(b"!!!!!");
        assert_eq!(mapping, before);
        assert_eq!(outcome.rejected, NUM_SLOTS);
    }

    #[test]
    fn test_partial_payload_with_invalid_byte() {
        let mut mapping = KeyMapping::default();
        let outcome = mapping.apply(b"123!");
        assert_eq!(mapping.to_string(), "123z_");
        assert_eq!(outcome, RemapOutcome { accepted: 3, rejected: 1, missing: 1 });
    }

    #[test]
    fn test_extra_bytes_ignored() {
        let mut mapping = KeyMapping::default();
        mapping.apply(b"abcdefgh");
        assert_eq!(mapping.to_string(), "abcde");
    }

    #[test]
    fn test_valid_symbols() {
        assert!(is_valid_symbol(b'0'));
        assert!(is_valid_symbol(b'Z'));
        assert!(is_valid_symbol(b'q'));
        assert!(!is_valid_symbol(b'_'));
        assert!(!is_valid_symbol(b' '));
        assert!(!is_valid_symbol(0xC3));
    }
}
