//! Microsecond counter on Timer1.
//!
//! Timer1 free-runs at clk/64 (4 µs per count at 16 MHz). The 16-bit count
//! is extended in software by watching for wraparound between reads, so
//! `micros` must be called at least once per 262 ms. The main loop and
//! every bounded wait in the core poll far more often than that.

use avr_device::atmega32u4::TC1;

use respbox_core::TimeSource;

/// CS12:0 = 0b011, clk/64.
const PRESCALE_64: u8 = 0x03;
const US_PER_COUNT: u32 = 4;

pub struct Timer1 {
    tc1: TC1,
    high: u16,
    last: u16,
}

impl Timer1 {
    pub fn new(tc1: TC1) -> Self {
        // Normal mode, no compare outputs, no interrupts
        tc1.tccr1a.write(|w| unsafe { w.bits(0) });
        tc1.timsk1.write(|w| unsafe { w.bits(0) });
        tc1.tcnt1.write(|w| unsafe { w.bits(0) });
        tc1.tccr1b.write(|w| unsafe { w.bits(PRESCALE_64) });

        Self {
            tc1,
            high: 0,
            last: 0,
        }
    }
}

impl TimeSource for Timer1 {
    fn micros(&mut self) -> u32 {
        let count = self.tc1.tcnt1.read().bits();
        if count < self.last {
            self.high = self.high.wrapping_add(1);
        }
        self.last = count;

        let ticks = (u32::from(self.high) << 16) | u32::from(count);
        ticks.wrapping_mul(US_PER_COUNT)
    }
}
