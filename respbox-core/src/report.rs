//! Boot-protocol keyboard reports built from the symbols currently held.

use crate::keycode::Keycode;

/// Most keys a boot keyboard report can carry at once.
pub const ROLLOVER: usize = 6;

/// Standard USB HID keyboard report (8 bytes).
/// Byte 0: modifier keys bitmask
/// Byte 1: reserved (0x00)
/// Bytes 2-7: up to 6 simultaneous keycodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardReport {
    pub modifiers: u8,
    pub reserved: u8,
    pub keys: [u8; ROLLOVER],
}

impl KeyboardReport {
    pub const fn empty() -> Self {
        Self {
            modifiers: 0,
            reserved: 0,
            keys: [0; ROLLOVER],
        }
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = self.modifiers;
        bytes[1] = self.reserved;
        bytes[2..].copy_from_slice(&self.keys);
        bytes
    }
}

/// ASCII symbols whose key is down. Two channels mapped to the same symbol
/// hold it twice, and the key stays down until both release.
///
/// A boot report has one modifier byte for all its keys, so a shifted
/// symbol shifts everything held with it: a button pressed during a touch
/// on the default `_` home symbol reaches the host upper-cased.
#[derive(Debug, Clone, Default)]
pub struct HeldKeys {
    slots: [Option<u8>; ROLLOVER],
}

impl HeldKeys {
    pub const fn new() -> Self {
        Self {
            slots: [None; ROLLOVER],
        }
    }

    /// Returns false if the symbol was dropped: no free slot or no keycode.
    pub fn press(&mut self, symbol: u8) -> bool {
        if Keycode::from_ascii(symbol).is_none() {
            return false;
        }
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(symbol);
                true
            }
            None => false,
        }
    }

    /// Returns false if the symbol was not held.
    pub fn release(&mut self, symbol: u8) -> bool {
        match self.slots.iter_mut().find(|slot| **slot == Some(symbol)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Shift is set while any held symbol needs it.
    pub fn report(&self) -> KeyboardReport {
        let mut report = KeyboardReport::empty();
        let mut key_idx = 0usize;

        for stroke in self.slots.iter().flatten().filter_map(|&s| Keycode::from_ascii(s)) {
            if stroke.shift {
                report.modifiers |= Keycode::LShift.modifier_bit();
            }
            let code = stroke.keycode as u8;
            if !report.keys[..key_idx].contains(&code) {
                report.keys[key_idx] = code;
                key_idx += 1;
            }
        }

        report
    }
}

/// Held symbols plus the last report the host took. A report that could not
/// be written stays pending, and goes out on a later attempt.
#[derive(Debug, Clone)]
pub struct ReportTracker {
    held: HeldKeys,
    last_sent: KeyboardReport,
}

impl Default for ReportTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportTracker {
    pub const fn new() -> Self {
        Self {
            held: HeldKeys::new(),
            last_sent: KeyboardReport::empty(),
        }
    }

    pub fn press(&mut self, symbol: u8) -> bool {
        self.held.press(symbol)
    }

    pub fn release(&mut self, symbol: u8) -> bool {
        self.held.release(symbol)
    }

    /// Report still to be written, if the host's view differs from the
    /// held set.
    pub fn pending(&self) -> Option<KeyboardReport> {
        let report = self.held.report();
        (report != self.last_sent).then_some(report)
    }

    pub fn mark_sent(&mut self, report: KeyboardReport) {
        self.last_sent = report;
    }

    /// The host forgot every key (bus reset, new configuration).
    pub fn host_reset(&mut self) {
        self.last_sent = KeyboardReport::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report() {
        let held = HeldKeys::new();
        assert!(held.is_empty());
        assert_eq!(held.report(), KeyboardReport::empty());
        assert_eq!(held.report().to_bytes(), [0; 8]);
    }

    #[test]
    fn test_press_and_release() {
        let mut held = HeldKeys::new();
        assert!(held.press(b'w'));
        assert!(held.press(b'y'));
        let report = held.report();
        assert_eq!(report.modifiers, 0);
        assert_eq!(&report.keys[..3], &[Keycode::W as u8, Keycode::Y as u8, 0]);

        assert!(held.release(b'w'));
        assert_eq!(held.report().keys[..2], [Keycode::Y as u8, 0]);
        assert!(!held.release(b'w'));
    }

    #[test]
    fn test_shifted_symbol_sets_modifier() {
        let mut held = HeldKeys::new();
        held.press(b'_');
        let report = held.report();
        assert_eq!(report.modifiers, 0x02);
        assert_eq!(report.keys[0], Keycode::Minus as u8);
        assert_eq!(report.to_bytes()[..3], [0x02, 0, 0x2D]);
    }

    #[test]
    fn test_shared_symbol_held_until_both_release() {
        let mut held = HeldKeys::new();
        held.press(b'a');
        held.press(b'a');
        assert_eq!(held.report().keys[..2], [Keycode::A as u8, 0]);
        held.release(b'a');
        assert_eq!(held.report().keys[0], Keycode::A as u8);
        held.release(b'a');
        assert!(held.is_empty());
    }

    #[test]
    fn test_rollover_limit() {
        let mut held = HeldKeys::new();
        for symbol in *b"abcdef" {
            assert!(held.press(symbol));
        }
        assert!(!held.press(b'g'));
        assert!(!held.press(b'!'));
    }

    #[test]
    fn test_shift_applies_to_every_held_key() {
        let mut held = HeldKeys::new();
        held.press(b'_');
        held.press(b'w');
        let report = held.report();
        assert_eq!(report.modifiers, 0x02);
        assert_eq!(report.keys[..3], [Keycode::Minus as u8, Keycode::W as u8, 0]);

        held.release(b'_');
        assert_eq!(held.report().modifiers, 0);
    }

    #[test]
    fn test_dropped_report_stays_pending() {
        let mut tracker = ReportTracker::new();
        assert_eq!(tracker.pending(), None);

        tracker.press(b'w');
        let down = tracker.pending().unwrap();
        tracker.mark_sent(down);
        assert_eq!(tracker.pending(), None);

        // Release fails to go out: the next attempt must still carry it
        tracker.release(b'w');
        assert_eq!(tracker.pending(), Some(KeyboardReport::empty()));
        assert_eq!(tracker.pending(), Some(KeyboardReport::empty()));

        tracker.mark_sent(KeyboardReport::empty());
        assert_eq!(tracker.pending(), None);
    }

    #[test]
    fn test_host_reset_resends_held_keys() {
        let mut tracker = ReportTracker::new();
        tracker.press(b'y');
        let report = tracker.pending().unwrap();
        tracker.mark_sent(report);

        tracker.host_reset();
        assert_eq!(tracker.pending(), Some(report));

        tracker.release(b'y');
        tracker.host_reset();
        assert_eq!(tracker.pending(), None);
    }
}
