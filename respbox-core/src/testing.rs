//! Fakes for the board traits.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::hal::{Keyboard, Sensors, SerialLink, TimeSource};
use crate::NUM_BUTTONS;

/// Shared-handle clock: clones see the same time. Every read advances it by
/// `step` µs so busy-waits terminate.
#[derive(Clone)]
pub struct FakeClock {
    now: Rc<Cell<u32>>,
    step: u32,
}

impl FakeClock {
    pub fn new(start: u32, step: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
            step,
        }
    }

    pub fn advance(&self, us: u32) {
        self.now.set(self.now.get().wrapping_add(us));
    }
}

impl TimeSource for FakeClock {
    fn micros(&mut self) -> u32 {
        let t = self.now.get();
        self.now.set(t.wrapping_add(self.step));
        t
    }
}

#[derive(Default)]
pub struct FakeLink {
    input: VecDeque<u8>,
    pub output: String,
}

impl FakeLink {
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn pending(&self) -> usize {
        self.input.len()
    }
}

impl fmt::Write for FakeLink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl SerialLink for FakeLink {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(u8),
    Release(u8),
}

#[derive(Default)]
pub struct RecordingKeyboard {
    pub actions: Vec<KeyAction>,
}

impl Keyboard for RecordingKeyboard {
    fn press(&mut self, symbol: u8) {
        self.actions.push(KeyAction::Press(symbol));
    }

    fn release(&mut self, symbol: u8) {
        self.actions.push(KeyAction::Release(symbol));
    }
}

pub struct FixedSensors {
    pub buttons: [bool; NUM_BUTTONS],
    pub intensity: f32,
}

impl Default for FixedSensors {
    fn default() -> Self {
        Self {
            buttons: [false; NUM_BUTTONS],
            intensity: 100.0,
        }
    }
}

impl Sensors for FixedSensors {
    fn read_buttons(&mut self) -> [bool; NUM_BUTTONS] {
        self.buttons
    }

    fn read_intensity(&mut self) -> f32 {
        self.intensity
    }
}
