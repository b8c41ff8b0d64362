//! USB HID keycodes for the symbols a key mapping can hold.
//! See USB HID Usage Tables, Section 10 (Keyboard/Keypad Page 0x07).

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Keycode {
    // Letters
    A = 0x04,
    B = 0x05,
    C = 0x06,
    D = 0x07,
    E = 0x08,
    F = 0x09,
    G = 0x0A,
    H = 0x0B,
    I = 0x0C,
    J = 0x0D,
    K = 0x0E,
    L = 0x0F,
    M = 0x10,
    N = 0x11,
    O = 0x12,
    P = 0x13,
    Q = 0x14,
    R = 0x15,
    S = 0x16,
    T = 0x17,
    U = 0x18,
    V = 0x19,
    W = 0x1A,
    X = 0x1B,
    Y = 0x1C,
    Z = 0x1D,

    // Numbers
    N1 = 0x1E,
    N2 = 0x1F,
    N3 = 0x20,
    N4 = 0x21,
    N5 = 0x22,
    N6 = 0x23,
    N7 = 0x24,
    N8 = 0x25,
    N9 = 0x26,
    N0 = 0x27,

    Space = 0x2C,
    /// `-` (unshifted) / `_` (shifted) on a US layout
    Minus = 0x2D,

    // Modifiers (used in the modifier byte, not in keycode array)
    LShift = 0xE1,
}

const LETTERS: [Keycode; 26] = [
    Keycode::A, Keycode::B, Keycode::C, Keycode::D, Keycode::E, Keycode::F,
    Keycode::G, Keycode::H, Keycode::I, Keycode::J, Keycode::K, Keycode::L,
    Keycode::M, Keycode::N, Keycode::O, Keycode::P, Keycode::Q, Keycode::R,
    Keycode::S, Keycode::T, Keycode::U, Keycode::V, Keycode::W, Keycode::X,
    Keycode::Y, Keycode::Z,
];

/// Digits in HID order: 1..9 then 0.
const DIGITS: [Keycode; 10] = [
    Keycode::N1, Keycode::N2, Keycode::N3, Keycode::N4, Keycode::N5,
    Keycode::N6, Keycode::N7, Keycode::N8, Keycode::N9, Keycode::N0,
];

/// A keycode plus whether Shift must be held to produce the symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Stroke {
    pub keycode: Keycode,
    pub shift: bool,
}

impl Keycode {
    /// Translate an ASCII symbol, as typed on a US layout.
    pub fn from_ascii(symbol: u8) -> Option<Stroke> {
        let (keycode, shift) = match symbol {
            b'a'..=b'z' => (LETTERS[(symbol - b'a') as usize], false),
            b'A'..=b'Z' => (LETTERS[(symbol - b'A') as usize], true),
            b'0' => (Keycode::N0, false),
            b'1'..=b'9' => (DIGITS[(symbol - b'1') as usize], false),
            b' ' => (Keycode::Space, false),
            b'-' => (Keycode::Minus, false),
            b'_' => (Keycode::Minus, true),
            _ => return None,
        };
        Some(Stroke { keycode, shift })
    }

    /// Check if this keycode is a modifier (LCtrl..RGui).
    pub fn is_modifier(self) -> bool {
        let v = self as u8;
        (0xE0..=0xE7).contains(&v)
    }

    /// Get the modifier bit mask (bit 0 = LCtrl, bit 7 = RGui).
    pub fn modifier_bit(self) -> u8 {
        if self.is_modifier() {
            1 << (self as u8 - 0xE0)
        } else {
            0
        }
    }
}
