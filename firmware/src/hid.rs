//! USB HID boot keyboard on the ATmega32U4's built-in USB controller.
//!
//! Keystrokes go out the moment the core reports an edge: each press or
//! release rebuilds the report from the held symbols and writes it to EP1.
//! A report the host did not take in time is written again from
//! [`UsbKeyboard::poll`], which also services control requests on EP0.

use avr_device::atmega32u4::{PLL, USB_DEVICE};

use respbox_core::{Keyboard, ReportTracker};

const EP0_SIZE: u8 = 64; // Control endpoint size
const EP1_SIZE: u8 = 8; // Interrupt IN endpoint size (keyboard reports)

/// Spins an edge waits for EP1 to take its report.
const REPORT_SPIN_LIMIT: u16 = 0xFFFF;
/// Spins a retry from the main loop waits, so a stalled host cannot slow
/// sampling.
const RETRY_SPIN_LIMIT: u16 = 1;

/// HID report descriptor for a standard keyboard.
static HID_REPORT_DESCRIPTOR: [u8; 64] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    // Modifier keys (8 bits)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0xE0, //   Usage Minimum (224) - LCtrl
    0x29, 0xE7, //   Usage Maximum (231) - RGui
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    // Reserved byte
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant)
    // LEDs (5 bits)
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x05, //   Usage Maximum (5)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    // LED padding (3 bits)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Constant)
    // Keycodes (6 bytes)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0xFF, //   Usage Maximum (255)
    0x81, 0x00, //   Input (Data, Array)
    0xC0, // End Collection
];

// USB descriptors
static DEVICE_DESCRIPTOR: [u8; 18] = [
    18,   // bLength
    1,    // bDescriptorType (Device)
    0x00, 0x02, // bcdUSB (2.0)
    0,    // bDeviceClass (defined at interface level)
    0,    // bDeviceSubClass
    0,    // bDeviceProtocol
    EP0_SIZE, // bMaxPacketSize0
    0xC0, 0x16, // idVendor (0x16C0, Van Ooijen Technische Informatica)
    0xDB, 0x27, // idProduct (0x27DB, shared-PID keyboard)
    0x01, 0x00, // bcdDevice (1.0)
    1,    // iManufacturer
    2,    // iProduct
    0,    // iSerialNumber
    1,    // bNumConfigurations
];

static CONFIG_DESCRIPTOR: [u8; 34] = [
    // Configuration descriptor
    9,    // bLength
    2,    // bDescriptorType (Configuration)
    34, 0, // wTotalLength
    1,    // bNumInterfaces
    1,    // bConfigurationValue
    0,    // iConfiguration
    0x80, // bmAttributes (bus powered)
    50,   // bMaxPower (100mA)
    // Interface descriptor
    9,    // bLength
    4,    // bDescriptorType (Interface)
    0,    // bInterfaceNumber
    0,    // bAlternateSetting
    1,    // bNumEndpoints
    3,    // bInterfaceClass (HID)
    1,    // bInterfaceSubClass (Boot)
    1,    // bInterfaceProtocol (Keyboard)
    0,    // iInterface
    // HID descriptor
    9,    // bLength
    0x21, // bDescriptorType (HID)
    0x11, 0x01, // bcdHID (1.11)
    0,    // bCountryCode
    1,    // bNumDescriptors
    0x22, // bDescriptorType (Report)
    HID_REPORT_DESCRIPTOR.len() as u8, 0, // wDescriptorLength
    // Endpoint descriptor (EP1 IN, interrupt)
    7,    // bLength
    5,    // bDescriptorType (Endpoint)
    0x81, // bEndpointAddress (EP1 IN)
    0x03, // bmAttributes (Interrupt)
    EP1_SIZE, 0, // wMaxPacketSize
    1,    // bInterval (1ms polling)
];

/// String descriptor 0 (language ID)
static STRING_DESC_0: [u8; 4] = [4, 3, 0x09, 0x04]; // English (US)

/// String descriptor 1 (manufacturer): "RespBox"
static STRING_DESC_1: [u8; 16] = [
    16, 3, // bLength, bDescriptorType
    b'R', 0, b'e', 0, b's', 0, b'p', 0, b'B', 0, b'o', 0, b'x', 0,
];

/// String descriptor 2 (product): "Response Box"
static STRING_DESC_2: [u8; 26] = [
    26, 3, // bLength, bDescriptorType
    b'R', 0, b'e', 0, b's', 0, b'p', 0, b'o', 0, b'n', 0, b's', 0, b'e', 0,
    b' ', 0, b'B', 0, b'o', 0, b'x', 0,
];

pub struct UsbKeyboard {
    usb: USB_DEVICE,
    configured: bool,
    reports: ReportTracker,
}

impl UsbKeyboard {
    /// Bring up the PLL and USB controller and attach to the bus.
    pub fn new(usb: USB_DEVICE, pll: &PLL) -> Self {
        // Enable USB pad regulator
        usb.uhwcon.write(|w| w.uvrege().set_bit());

        // Enable USB controller and VBUS pad
        usb.usbcon.write(|w| w.usbe().set_bit().otgpade().set_bit());

        // 16MHz crystal -> 96MHz PLL -> 48MHz USB clock
        pll.pllcsr.write(|w| w.pindiv().set_bit().plle().set_bit());
        while pll.pllcsr.read().plock().bit_is_clear() {}

        usb.usbcon.modify(|_, w| w.frzclk().clear_bit());
        usb.udcon.modify(|_, w| w.detach().clear_bit());
        usb.udien.write(|w| w.eorste().set_bit());

        Self {
            usb,
            configured: false,
            reports: ReportTracker::new(),
        }
    }

    /// Handle bus reset and control requests, then retry a report that did
    /// not go out. Call once per loop iteration.
    pub fn poll(&mut self) {
        if self.usb.udint.read().eorsti().bit_is_set() {
            self.usb.udint.modify(|_, w| w.eorsti().clear_bit());
            self.configure_ep0();
            self.configured = false;
        }

        self.select_endpoint(0);
        if self.usb.ueintx.read().rxstpi().bit_is_set() {
            self.handle_setup();
        }

        self.flush(RETRY_SPIN_LIMIT);
    }

    /// Write the report for the current held set to EP1, if it changed.
    /// Left pending while unconfigured or if EP1 stays busy for `spins`.
    fn flush(&mut self, spins: u16) {
        if !self.configured {
            return;
        }
        let Some(report) = self.reports.pending() else {
            return;
        };

        self.select_endpoint(1);
        let mut spins = spins;
        while self.usb.ueintx.read().rwal().bit_is_clear() {
            spins = spins.saturating_sub(1);
            if spins == 0 {
                return;
            }
        }

        for byte in report.to_bytes() {
            self.usb.uedatx.write(|w| w.bits(byte));
        }
        self.usb
            .ueintx
            .modify(|_, w| w.fifocon().clear_bit().txini().clear_bit());

        self.reports.mark_sent(report);
    }

    fn configure_ep0(&self) {
        self.select_endpoint(0);
        // Control endpoint, 64 bytes
        self.usb.ueconx.write(|w| w.epen().set_bit());
        self.usb.uecfg0x.write(|w| w.eptype().bits(0b00));
        self.usb.uecfg1x.write(|w| w.epsize().bits(0b011).alloc().set_bit());
    }

    fn configure_ep1(&self) {
        self.select_endpoint(1);
        // Interrupt IN, 8 bytes
        self.usb.ueconx.write(|w| w.epen().set_bit());
        self.usb.uecfg0x.write(|w| w.eptype().bits(0b11).epdir().set_bit());
        self.usb.uecfg1x.write(|w| w.epsize().bits(0b000).alloc().set_bit());
    }

    fn select_endpoint(&self, ep: u8) {
        self.usb.uenum.write(|w| w.bits(ep & 0x07));
    }

    /// Send a zero-length packet for the status stage.
    fn ack(&self) {
        self.usb.ueintx.modify(|_, w| w.txini().clear_bit());
    }

    fn handle_setup(&mut self) {
        let mut setup = [0u8; 8];
        for byte in setup.iter_mut() {
            *byte = self.usb.uedatx.read().bits();
        }
        self.usb.ueintx.modify(|_, w| w.rxstpi().clear_bit());

        let [request_type, request, value_lo, value_hi, _, _, length_lo, length_hi] = setup;
        let length = u16::from_le_bytes([length_lo, length_hi]);

        match (request_type, request) {
            // GET_DESCRIPTOR
            (0x80, 0x06) => match (value_hi, value_lo) {
                (1, _) => self.send_descriptor(&DEVICE_DESCRIPTOR, length),
                (2, _) => self.send_descriptor(&CONFIG_DESCRIPTOR, length),
                (3, 0) => self.send_descriptor(&STRING_DESC_0, length),
                (3, 1) => self.send_descriptor(&STRING_DESC_1, length),
                (3, 2) => self.send_descriptor(&STRING_DESC_2, length),
                _ => self.stall(),
            },
            // SET_ADDRESS: status stage first, then enable the address
            (0x00, 0x05) => {
                self.ack();
                while self.usb.ueintx.read().txini().bit_is_clear() {}
                self.usb
                    .udaddr
                    .write(|w| w.uadd().bits(value_lo & 0x7F).adden().set_bit());
            }
            // SET_CONFIGURATION
            (0x00, 0x09) => {
                self.ack();
                self.configure_ep1();
                self.configured = true;
                // Anything held before enumeration finished
                self.reports.host_reset();
                self.flush(REPORT_SPIN_LIMIT);
            }
            // GET_CONFIGURATION
            (0x80, 0x08) => {
                while self.usb.ueintx.read().txini().bit_is_clear() {}
                self.usb.uedatx.write(|w| w.bits(u8::from(self.configured)));
                self.ack();
            }
            // HID GET_DESCRIPTOR (report)
            (0x81, 0x06) if value_hi == 0x22 => {
                self.send_descriptor(&HID_REPORT_DESCRIPTOR, length)
            }
            // HID SET_IDLE, SET_PROTOCOL
            (0x21, 0x0A) | (0x21, 0x0B) => self.ack(),
            _ => self.stall(),
        }
    }

    fn send_descriptor(&self, desc: &[u8], max_length: u16) {
        let len = desc.len().min(max_length as usize);

        for chunk in desc[..len].chunks(EP0_SIZE as usize) {
            while self.usb.ueintx.read().txini().bit_is_clear() {}
            for &byte in chunk {
                self.usb.uedatx.write(|w| w.bits(byte));
            }
            self.ack();
        }

        // Status stage: host sends ZLP
        while self.usb.ueintx.read().rxouti().bit_is_clear() {}
        self.usb.ueintx.modify(|_, w| w.rxouti().clear_bit());
    }

    fn stall(&self) {
        self.usb.ueconx.modify(|_, w| w.stallrq().set_bit());
    }
}

impl Keyboard for UsbKeyboard {
    fn press(&mut self, symbol: u8) {
        if self.reports.press(symbol) {
            self.flush(REPORT_SPIN_LIMIT);
        }
    }

    fn release(&mut self, symbol: u8) {
        if self.reports.release(symbol) {
            self.flush(REPORT_SPIN_LIMIT);
        }
    }
}
