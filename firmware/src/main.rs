//! Response box firmware for ATmega32U4 (Teensy 2.0).
//!
//! Board bring-up around `respbox_core::Device`:
//! - four buttons on PB0-PB3 and a touch pad on PB6
//! - Timer1 as the microsecond clock
//! - USART1 for host commands and snapshot lines
//! - USB HID keyboard for keystrokes
//!
//! Only the AVR build carries any of this; other targets get an empty
//! binary so the workspace builds and tests on a development host.

#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]
#![cfg_attr(target_arch = "avr", feature(asm_experimental_arch))]

#[cfg(target_arch = "avr")]
mod hid;
#[cfg(target_arch = "avr")]
mod inputs;
#[cfg(target_arch = "avr")]
mod timer;
#[cfg(target_arch = "avr")]
mod usart;

#[cfg(target_arch = "avr")]
mod board {
    use avr_device::atmega32u4::Peripherals;
    use respbox_core::{Device, DeviceConfig};

    use crate::hid::UsbKeyboard;
    use crate::inputs::Inputs;
    use crate::timer::Timer1;
    use crate::usart::Usart;

    /// Panic handler: on AVR we just loop forever.
    #[panic_handler]
    fn panic(_info: &core::panic::PanicInfo) -> ! {
        loop {}
    }

    #[no_mangle]
    pub extern "C" fn main() -> ! {
        let dp = unsafe { Peripherals::steal() };

        // Clock prescaler 1 (16MHz), in case the fuses say otherwise
        dp.CPU.clkpr.write(|w| w.clkpce().set_bit());
        dp.CPU.clkpr.write(|w| unsafe { w.bits(0) });

        // PD6: on-board LED, lit once running
        dp.PORTD.ddrd.modify(|r, w| unsafe { w.bits(r.bits() | 0x40) });

        let mut usb = UsbKeyboard::new(dp.USB_DEVICE, &dp.PLL);
        let mut serial = Usart::new(dp.USART1);
        let mut inputs = Inputs::new(dp.PORTB);

        // The default configuration always validates; a failure here would
        // leave the LED dark.
        let Ok(mut device) = Device::new(DeviceConfig::default(), Timer1::new(dp.TC1)) else {
            loop {}
        };

        dp.PORTD.portd.modify(|r, w| unsafe { w.bits(r.bits() | 0x40) });

        loop {
            usb.poll();
            device.step(&mut inputs, &mut serial, &mut usb);
        }
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {}
