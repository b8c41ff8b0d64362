//! Buttons and the touch pad, all on port B.
//!
//! Teensy 2.0 pin mapping:
//!   Buttons (inputs w/ pull-up, active low): PB0, PB1, PB2, PB3
//!   Touch pad (single-pin charge timing):    PB6

use avr_device::atmega32u4::PORTB;

use respbox_core::{Sensors, NUM_BUTTONS};

const BUTTON_MASK: u8 = 0x0F;
const TOUCH_PIN: u8 = 1 << 6;

/// Charge cycles summed per intensity reading.
const TOUCH_SAMPLES: u8 = 4;
/// Upper bound on one charge count, for a pad shorted to ground.
const TOUCH_MAX_COUNT: u16 = 2_000;

pub struct Inputs {
    port: PORTB,
}

impl Inputs {
    pub fn new(port: PORTB) -> Self {
        // Buttons: input with pull-up
        port.ddrb.modify(|r, w| unsafe { w.bits(r.bits() & !BUTTON_MASK) });
        port.portb.modify(|r, w| unsafe { w.bits(r.bits() | BUTTON_MASK) });
        let inputs = Self { port };
        inputs.discharge_pad();
        inputs
    }

    /// Drive the pad low to empty it.
    fn discharge_pad(&self) {
        self.port.portb.modify(|r, w| unsafe { w.bits(r.bits() & !TOUCH_PIN) });
        self.port.ddrb.modify(|r, w| unsafe { w.bits(r.bits() | TOUCH_PIN) });
    }

    /// Release the pad to charge through the internal pull-up and count
    /// until it reads high. A finger adds capacitance and slows the charge.
    fn charge_count(&self) -> u16 {
        self.discharge_pad();
        tiny_delay();

        self.port.ddrb.modify(|r, w| unsafe { w.bits(r.bits() & !TOUCH_PIN) });
        self.port.portb.modify(|r, w| unsafe { w.bits(r.bits() | TOUCH_PIN) });

        let mut count = 0u16;
        while self.port.pinb.read().bits() & TOUCH_PIN == 0 && count < TOUCH_MAX_COUNT {
            count += 1;
        }

        self.discharge_pad();
        count
    }
}

impl Sensors for Inputs {
    fn read_buttons(&mut self) -> [bool; NUM_BUTTONS] {
        let pins = self.port.pinb.read().bits();
        // Active low
        core::array::from_fn(|i| pins & (1 << i) == 0)
    }

    fn read_intensity(&mut self) -> f32 {
        let total: u16 = (0..TOUCH_SAMPLES).map(|_| self.charge_count()).sum();
        f32::from(total)
    }
}

/// Short delay for pin settling (~5us at 16MHz).
#[inline(always)]
fn tiny_delay() {
    for _ in 0..20u8 {
        unsafe { core::arch::asm!("nop") };
    }
}
