//! Serial connection to the response box.
//!
//! Replies and snapshot lines share one stream. Snapshots can show up at any
//! time, so waiting for a reply means skipping lines that parse as
//! snapshots.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, trace};
use respbox_core::{Command, NUM_SLOTS};
use thiserror::Error;

use crate::snapshot::is_snapshot_line;
use crate::sync::SyncSample;

/// Per-read poll interval; overall waits are bounded separately.
const POLL_TIMEOUT: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no reply from device within {0:?}")]
    Timeout(Duration),
    #[error("unexpected reply {0:?}")]
    BadReply(String),
    #[error("mapping must be exactly {expected} symbols, got {found}")]
    MappingLength { expected: usize, found: usize },
    #[error(transparent)]
    Serial(#[from] serialport::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Byte stream to the device. Reads time out with `TimedOut` after
/// `POLL_TIMEOUT` when nothing arrived.
pub trait Port: Read + Write {
    /// Drop whatever the device sent that nobody read yet.
    fn discard_input(&mut self) -> Result<(), LinkError>;
}

impl Port for Box<dyn serialport::SerialPort> {
    fn discard_input(&mut self) -> Result<(), LinkError> {
        self.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

pub struct DeviceLink<P = Box<dyn serialport::SerialPort>> {
    port: P,
    pending: Vec<u8>,
    reply_timeout: Duration,
}

impl DeviceLink {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        reply_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(POLL_TIMEOUT)
            .open()?;
        debug!("opened {port_name} at {baud_rate} baud");

        Ok(Self::with_port(port, reply_timeout))
    }

    /// Serial ports the OS reports, by name.
    pub fn list_ports() -> Result<Vec<String>, LinkError> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect())
    }
}

impl<P: Port> DeviceLink<P> {
    pub fn with_port(port: P, reply_timeout: Duration) -> Self {
        Self {
            port,
            pending: Vec::with_capacity(256),
            reply_timeout,
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    /// Next complete line, without its terminator, or `None` once `deadline`
    /// passes.
    pub fn read_line(&mut self, deadline: Instant) -> Result<Option<String>, LinkError> {
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=end).collect();
                let text = String::from_utf8_lossy(&line).trim_end().to_string();
                trace!("<- {text:?}");
                return Ok(Some(text));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }

            let mut chunk = [0u8; 64];
            match self.port.read(&mut chunk) {
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send one command byte (plus payload) and wait for its reply line.
    fn request(&mut self, command: Command, payload: &[u8]) -> Result<String, LinkError> {
        let mut frame = vec![command.byte()];
        frame.extend_from_slice(payload);
        self.send(&frame)?;

        let deadline = Instant::now() + self.reply_timeout;
        while let Some(line) = self.read_line(deadline)? {
            if is_snapshot_line(&line) {
                debug!("skipping snapshot while waiting for reply: {line}");
                continue;
            }
            if !line.is_empty() {
                return Ok(line);
            }
        }
        Err(LinkError::Timeout(self.reply_timeout))
    }

    /// One `T` exchange.
    pub fn sync_round(&mut self) -> Result<SyncSample, LinkError> {
        // Drop stale input so the reply we time is this round's
        self.pending.clear();
        self.port.discard_input()?;

        let sent_at = Utc::now();
        let started = Instant::now();
        let reply = self.request(Command::Sync, &[])?;
        let round_trip = started.elapsed();

        let device_us = reply
            .parse()
            .map_err(|_| LinkError::BadReply(reply.clone()))?;
        Ok(SyncSample {
            sent_at,
            round_trip_us: round_trip.as_micros() as u64,
            device_us,
        })
    }

    /// Replace the mapping. The device echoes what it kept, which differs
    /// from `symbols` wherever a symbol was rejected.
    pub fn remap(&mut self, symbols: &str) -> Result<String, LinkError> {
        if symbols.len() != NUM_SLOTS {
            return Err(LinkError::MappingLength {
                expected: NUM_SLOTS,
                found: symbols.len(),
            });
        }
        self.request(Command::Remap, symbols.as_bytes())
    }

    pub fn list_mapping(&mut self) -> Result<String, LinkError> {
        self.request(Command::ListMapping, &[])
    }

    pub fn raw_intensity(&mut self) -> Result<f32, LinkError> {
        self.request_number(Command::RawIntensity)
    }

    pub fn average(&mut self) -> Result<f32, LinkError> {
        self.request_number(Command::Average)
    }

    fn request_number(&mut self, command: Command) -> Result<f32, LinkError> {
        let reply = self.request(command, &[])?;
        reply.parse().map_err(|_| LinkError::BadReply(reply))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// In-memory device: each flushed request releases the next scripted
    /// reply. Reads hand out a few bytes at a time so lines arrive split.
    #[derive(Default)]
    struct ScriptedPort {
        incoming: VecDeque<u8>,
        replies: VecDeque<&'static str>,
        written: Vec<u8>,
    }

    impl ScriptedPort {
        fn replying(replies: &[&'static str]) -> Self {
            Self {
                replies: replies.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.incoming.is_empty() {
                return Err(io::ErrorKind::TimedOut.into());
            }
            let n = buf.len().min(self.incoming.len()).min(3);
            for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if let Some(reply) = self.replies.pop_front() {
                self.incoming.extend(reply.bytes());
            }
            Ok(())
        }
    }

    impl Port for ScriptedPort {
        fn discard_input(&mut self) -> Result<(), LinkError> {
            self.incoming.clear();
            Ok(())
        }
    }

    fn link(port: ScriptedPort) -> DeviceLink<ScriptedPort> {
        DeviceLink::with_port(port, Duration::from_millis(200))
    }

    #[test]
    fn test_reply_found_behind_snapshot_lines() {
        let port = ScriptedPort::replying(&["0 0 1 0 0 1234\n4 1300\n\nwxyz_\n"]);
        let mut link = link(port);
        assert_eq!(link.list_mapping().unwrap(), "wxyz_");
        assert_eq!(link.port.written, b"l");
    }

    #[test]
    fn test_only_snapshots_times_out() {
        let port = ScriptedPort::replying(&["0 0 0 0 1 10\n0 0 0 0 0 20\n"]);
        let mut link = DeviceLink::with_port(port, Duration::from_millis(60));
        assert!(matches!(link.average(), Err(LinkError::Timeout(_))));
    }

    #[test]
    fn test_sync_round_ignores_stale_input() {
        let mut port = ScriptedPort::replying(&["4 999\n5123\n"]);
        port.incoming.extend(b"77\n".iter());
        let mut link = link(port);

        let sample = link.sync_round().unwrap();
        assert_eq!(sample.device_us, 5123);
        assert_eq!(link.port.written, b"T");
    }

    #[test]
    fn test_number_replies() {
        let port = ScriptedPort::replying(&["87.25\n", "oops\n"]);
        let mut link = link(port);
        assert_eq!(link.raw_intensity().unwrap(), 87.25);
        assert!(matches!(link.average(), Err(LinkError::BadReply(r)) if r == "oops"));
        assert_eq!(link.port.written, b"ca");
    }

    #[test]
    fn test_remap_checks_length_before_sending() {
        let mut link = link(ScriptedPort::replying(&["abcdH\n"]));
        assert!(matches!(
            link.remap("abc"),
            Err(LinkError::MappingLength { expected: NUM_SLOTS, found: 3 })
        ));
        assert!(link.port.written.is_empty());

        assert_eq!(link.remap("abcdH").unwrap(), "abcdH");
        assert_eq!(link.port.written, b"LabcdH");
    }
}
