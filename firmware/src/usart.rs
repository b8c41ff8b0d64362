//! USART1 serial link (PD2 RX, PD3 TX), 115200 8N1.

use core::fmt;

use avr_device::atmega32u4::USART1;

use respbox_core::SerialLink;

/// UBRR for 115200 baud in double-speed mode at 16 MHz:
/// 16MHz / (8 * 115200) - 1 = 16.4 => 16 (2.1% error)
const UBRR_115200_U2X: u16 = 16;

// UCSR1A bits
const RXC1: u8 = 1 << 7;
const UDRE1: u8 = 1 << 5;
const U2X1: u8 = 1 << 1;
// UCSR1B bits
const RXEN1: u8 = 1 << 4;
const TXEN1: u8 = 1 << 3;
// UCSR1C: asynchronous, no parity, 1 stop bit, 8 data bits
const FRAME_8N1: u8 = 0x06;

/// Spins allowed waiting for the transmit buffer before a write gives up.
const TX_SPIN_LIMIT: u16 = 0xFFFF;

pub struct Usart {
    usart: USART1,
}

impl Usart {
    pub fn new(usart: USART1) -> Self {
        usart.ubrr1.write(|w| unsafe { w.bits(UBRR_115200_U2X) });
        usart.ucsr1a.write(|w| unsafe { w.bits(U2X1) });
        usart.ucsr1c.write(|w| unsafe { w.bits(FRAME_8N1) });
        usart.ucsr1b.write(|w| unsafe { w.bits(RXEN1 | TXEN1) });
        Self { usart }
    }

    fn write_byte(&mut self, byte: u8) -> fmt::Result {
        let mut spins = TX_SPIN_LIMIT;
        while self.usart.ucsr1a.read().bits() & UDRE1 == 0 {
            spins -= 1;
            if spins == 0 {
                return Err(fmt::Error);
            }
        }
        self.usart.udr1.write(|w| unsafe { w.bits(byte) });
        Ok(())
    }
}

impl fmt::Write for Usart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.bytes().try_for_each(|b| self.write_byte(b))
    }
}

impl SerialLink for Usart {
    fn read_byte(&mut self) -> Option<u8> {
        if self.usart.ucsr1a.read().bits() & RXC1 == 0 {
            return None;
        }
        Some(self.usart.udr1.read().bits())
    }
}
