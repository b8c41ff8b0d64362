//! Single-byte serial commands from the host.
//!
//! | Byte | Action                       | Reply                       |
//! |------|------------------------------|-----------------------------|
//! | `T`  | reset the clock epoch        | µs elapsed since the reset  |
//! | `L`  | read N+1 mapping bytes       | the resulting mapping       |
//! | `l`  | -                            | the current mapping         |
//! | `c`  | -                            | raw capacitive intensity    |
//! | `a`  | -                            | capacitive running average  |
//!
//! Anything else is dropped without a reply. Replies are newline-terminated.

use core::fmt::{self, Write};

use log::{debug, trace, warn};

use crate::capacitive::CapacitiveDebouncer;
use crate::clock::{Deadline, ResetClock};
use crate::hal::{SerialLink, TimeSource};
use crate::keymap::KeyMapping;
use crate::NUM_SLOTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Sync,
    Remap,
    ListMapping,
    RawIntensity,
    Average,
}

impl Command {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'T' => Some(Command::Sync),
            b'L' => Some(Command::Remap),
            b'l' => Some(Command::ListMapping),
            b'c' => Some(Command::RawIntensity),
            b'a' => Some(Command::Average),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            Command::Sync => b'T',
            Command::Remap => b'L',
            Command::ListMapping => b'l',
            Command::RawIntensity => b'c',
            Command::Average => b'a',
        }
    }
}

/// Read into `buf` until it is full or `deadline` passes. Returns how many
/// bytes arrived; the caller must handle a short read.
pub fn read_until<S: SerialLink, T: TimeSource>(
    link: &mut S,
    clock: &mut ResetClock<T>,
    buf: &mut [u8],
    deadline: Deadline,
) -> usize {
    let mut filled = 0;
    while filled < buf.len() && !deadline.expired(clock.ticks()) {
        if let Some(byte) = link.read_byte() {
            buf[filled] = byte;
            filled += 1;
        }
    }
    filled
}

/// Executes at most one command per call.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    remap_timeout_us: u32,
}

impl CommandHandler {
    pub const fn new(remap_timeout_us: u32) -> Self {
        Self { remap_timeout_us }
    }

    /// Consume one pending byte, if any, and act on it. Returns the command
    /// that ran.
    pub fn poll<S: SerialLink, T: TimeSource>(
        &self,
        link: &mut S,
        clock: &mut ResetClock<T>,
        mapping: &mut KeyMapping,
        touch: &CapacitiveDebouncer,
    ) -> Option<Command> {
        let byte = link.read_byte()?;
        let Some(command) = Command::from_byte(byte) else {
            trace!("ignoring byte 0x{byte:02X}");
            return None;
        };

        if self.execute(command, link, clock, mapping, touch).is_err() {
            warn!("reply to {command:?} not written");
        }
        Some(command)
    }

    fn execute<S: SerialLink, T: TimeSource>(
        &self,
        command: Command,
        link: &mut S,
        clock: &mut ResetClock<T>,
        mapping: &mut KeyMapping,
        touch: &CapacitiveDebouncer,
    ) -> fmt::Result {
        match command {
            Command::Sync => {
                clock.reset();
                let elapsed = clock.now();
                writeln!(link, "{elapsed}")
            }
            Command::Remap => {
                let mut payload = [0u8; NUM_SLOTS];
                let deadline = Deadline::after(clock.ticks(), self.remap_timeout_us);
                let received = read_until(link, clock, &mut payload, deadline);
                let outcome = mapping.apply(&payload[..received]);
                debug!(
                    "remap: {} accepted, {} rejected, {} missing",
                    outcome.accepted, outcome.rejected, outcome.missing
                );
                writeln!(link, "{mapping}")
            }
            Command::ListMapping => writeln!(link, "{mapping}"),
            Command::RawIntensity => writeln!(link, "{:.2}", touch.get_raw()),
            Command::Average => writeln!(link, "{:.2}", touch.get_average()),
        }
    }
}
