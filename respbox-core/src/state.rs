//! Composite snapshot of every channel and change detection between ticks.

use crate::capacitive::CapacitiveDebouncer;
use crate::debounce::Debouncer;
use crate::NUM_BUTTONS;

/// What to do when the home channel flips back to the value it had two
/// snapshots ago (an A-B-A pattern across consecutive ticks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HomeRetrigger {
    /// Hold the previous home value for one more tick.
    Suppress,
    /// Report every home transition as it happens.
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyState {
    /// Button states by physical index: true = pressed.
    pub keys: [bool; NUM_BUTTONS],
    pub home: bool,
    /// Differs from the previous snapshot.
    pub changed: bool,
    /// Clock reading (µs since epoch) when the snapshot was taken.
    pub timestamp: u32,
}

impl KeyState {
    /// Button states packed LSB first: bit i = button i.
    pub fn bitmask(&self) -> u8 {
        self.keys
            .iter()
            .enumerate()
            .fold(0, |mask, (i, &pressed)| mask | (u8::from(pressed) << i))
    }

    fn same_channels(&self, other: &KeyState) -> bool {
        self.keys == other.keys && self.home == other.home
    }
}

/// Builds one snapshot per aggregation tick and keeps just enough history
/// (the previous snapshot and the home value before it) to diff against.
#[derive(Debug, Clone)]
pub struct Aggregator {
    policy: HomeRetrigger,
    previous: KeyState,
    home_before_previous: bool,
}

impl Aggregator {
    pub const fn new(policy: HomeRetrigger) -> Self {
        Self {
            policy,
            previous: KeyState {
                keys: [false; NUM_BUTTONS],
                home: false,
                changed: false,
                timestamp: 0,
            },
            home_before_previous: false,
        }
    }

    pub fn aggregate(
        &mut self,
        buttons: &[Debouncer; NUM_BUTTONS],
        touch: &CapacitiveDebouncer,
        now: u32,
    ) -> KeyState {
        let mut next = KeyState {
            keys: core::array::from_fn(|i| buttons[i].is_pressed()),
            home: touch.is_pressed(),
            changed: false,
            timestamp: now,
        };

        if self.policy == HomeRetrigger::Suppress
            && next.home != self.previous.home
            && next.home == self.home_before_previous
        {
            next.home = self.previous.home;
        }

        next.changed = !next.same_channels(&self.previous);

        self.home_before_previous = self.previous.home;
        self.previous = next;
        next
    }
}
