//! Parsing snapshot lines printed by the device.

use std::fmt;

use respbox_core::{SnapshotFormat, NUM_BUTTONS};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("bad channel field {0:?}")]
    Channel(String),
    #[error("bad button mask {0:?}")]
    Mask(String),
    #[error("bad timestamp {0:?}")]
    Timestamp(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub keys: [bool; NUM_BUTTONS],
    /// Not carried by the bitmask framing.
    pub home: Option<bool>,
    /// Device clock reading, µs since the last sync.
    pub elapsed_us: u32,
}

/// Command replies are a single token; snapshot lines always have several.
pub fn is_snapshot_line(line: &str) -> bool {
    line.split_whitespace().nth(1).is_some()
}

pub fn parse_line(line: &str, format: SnapshotFormat) -> Result<Snapshot, SnapshotError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match format {
        SnapshotFormat::Bitmask => parse_bitmask(&fields),
        SnapshotFormat::Fields => parse_fields(&fields),
    }
}

fn parse_bitmask(fields: &[&str]) -> Result<Snapshot, SnapshotError> {
    let [mask, elapsed] = fields else {
        return Err(SnapshotError::FieldCount {
            expected: 2,
            found: fields.len(),
        });
    };
    let bits = u8::from_str_radix(mask, 16).map_err(|_| SnapshotError::Mask(mask.to_string()))?;
    if u32::from(bits) >> NUM_BUTTONS != 0 {
        return Err(SnapshotError::Mask(mask.to_string()));
    }
    Ok(Snapshot {
        keys: std::array::from_fn(|i| bits & (1 << i) != 0),
        home: None,
        elapsed_us: parse_timestamp(elapsed)?,
    })
}

fn parse_fields(fields: &[&str]) -> Result<Snapshot, SnapshotError> {
    let expected = NUM_BUTTONS + 2;
    if fields.len() != expected {
        return Err(SnapshotError::FieldCount {
            expected,
            found: fields.len(),
        });
    }
    let mut channels = [false; NUM_BUTTONS + 1];
    for (slot, field) in channels.iter_mut().zip(fields) {
        *slot = match *field {
            "0" => false,
            "1" => true,
            other => return Err(SnapshotError::Channel(other.to_string())),
        };
    }
    Ok(Snapshot {
        keys: std::array::from_fn(|i| channels[i]),
        home: Some(channels[NUM_BUTTONS]),
        elapsed_us: parse_timestamp(fields[expected - 1])?,
    })
}

fn parse_timestamp(field: &str) -> Result<u32, SnapshotError> {
    field
        .parse()
        .map_err(|_| SnapshotError::Timestamp(field.to_string()))
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pressed: Vec<String> = self
            .keys
            .iter()
            .enumerate()
            .filter(|&(_, &down)| down)
            .map(|(i, _)| i.to_string())
            .collect();
        if pressed.is_empty() {
            write!(f, "buttons: -")?;
        } else {
            write!(f, "buttons: {}", pressed.join(","))?;
        }
        match self.home {
            Some(true) => write!(f, "  home: touched"),
            Some(false) => write!(f, "  home: -"),
            None => Ok(()),
        }
    }
}
