//! Machine status datagram codec
//!
//! Every datagram is a fixed 28-byte little-endian record: four `f32`
//! coordinates (x, y, z, b) followed by a state code and the played/total
//! program counters. Firmware revisions differ in how the trailing fields
//! are packed, so the layout is always chosen explicitly.

use focuskit_core::{Axes, MachineState, TelemetryError};
use serde::{Deserialize, Serialize};

/// Size of every telemetry record in bytes
pub const RECORD_SIZE: usize = 28;

/// Packing of the fields after the coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryLayout {
    /// `u8` state at byte 16, three padding bytes, `u32` played, `u32` total
    #[default]
    Rev1,
    /// `i32` state, `i32` played, `i32` total
    Rev2,
}

/// One decoded telemetry record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    /// Machine coordinates
    pub axes: Axes,
    /// Program run state
    pub state: MachineState,
    /// Program lines played
    pub played: i64,
    /// Program lines in total
    pub total: i64,
}

impl TelemetryLayout {
    /// Decode a datagram
    pub fn decode(&self, data: &[u8]) -> Result<TelemetryRecord, TelemetryError> {
        let bytes: &[u8; RECORD_SIZE] =
            data.try_into().map_err(|_| TelemetryError::WrongSize {
                expected: RECORD_SIZE,
                actual: data.len(),
            })?;

        let axes = Axes::new(
            f32_at(bytes, 0),
            f32_at(bytes, 4),
            f32_at(bytes, 8),
            f32_at(bytes, 12),
        );

        let (code, played, total) = match self {
            TelemetryLayout::Rev1 => (
                i32::from(bytes[16]),
                i64::from(u32_at(bytes, 20)),
                i64::from(u32_at(bytes, 24)),
            ),
            TelemetryLayout::Rev2 => (
                i32_at(bytes, 16),
                i64::from(i32_at(bytes, 20)),
                i64::from(i32_at(bytes, 24)),
            ),
        };

        Ok(TelemetryRecord {
            axes,
            state: MachineState::from_code(code),
            played,
            total,
        })
    }

    /// Encode a record, as the machine would send it
    ///
    /// Counters are truncated to the field width of the layout.
    pub fn encode(&self, record: &TelemetryRecord) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        let axes = record.axes;
        for (i, value) in [axes.x, axes.y, axes.z, axes.b].into_iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }

        match self {
            TelemetryLayout::Rev1 => {
                bytes[16] = record.state.code() as u8;
                bytes[20..24].copy_from_slice(&(record.played as u32).to_le_bytes());
                bytes[24..28].copy_from_slice(&(record.total as u32).to_le_bytes());
            }
            TelemetryLayout::Rev2 => {
                bytes[16..20].copy_from_slice(&record.state.code().to_le_bytes());
                bytes[20..24].copy_from_slice(&(record.played as i32).to_le_bytes());
                bytes[24..28].copy_from_slice(&(record.total as i32).to_le_bytes());
            }
        }
        bytes
    }
}

fn word(bytes: &[u8; RECORD_SIZE], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

fn f32_at(bytes: &[u8; RECORD_SIZE], offset: usize) -> f32 {
    f32::from_le_bytes(word(bytes, offset))
}

fn u32_at(bytes: &[u8; RECORD_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes(word(bytes, offset))
}

fn i32_at(bytes: &[u8; RECORD_SIZE], offset: usize) -> i32 {
    i32::from_le_bytes(word(bytes, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetryRecord {
        TelemetryRecord {
            axes: Axes::new(10.5, -2.25, 30.0, 120.0),
            state: MachineState::Paused,
            played: 42,
            total: 1000,
        }
    }

    #[test]
    fn test_rev1_field_offsets() {
        let bytes = TelemetryLayout::Rev1.encode(&sample());
        assert_eq!(&bytes[12..16], &120.0f32.to_le_bytes());
        assert_eq!(bytes[16], 2);
        assert_eq!(&bytes[17..20], &[0, 0, 0]);
        assert_eq!(&bytes[20..24], &42u32.to_le_bytes());

        assert_eq!(TelemetryLayout::Rev1.decode(&bytes), Ok(sample()));
    }

    #[test]
    fn test_layouts_disagree_on_same_bytes() {
        // A Rev2 record with state 1 reads as Rev1 state 1 as well, but a
        // large played counter only survives in its own layout
        let mut record = sample();
        record.state = MachineState::Playing;
        record.played = 70_000;
        let bytes = TelemetryLayout::Rev2.encode(&record);
        assert_eq!(TelemetryLayout::Rev2.decode(&bytes), Ok(record));
        assert_eq!(
            TelemetryLayout::Rev1.decode(&bytes).map(|r| r.state),
            Ok(MachineState::Playing)
        );
    }

    #[test]
    fn test_wrong_size_rejected() {
        for len in [0, 27, 29, 64] {
            let data = vec![0u8; len];
            assert_eq!(
                TelemetryLayout::Rev1.decode(&data),
                Err(TelemetryError::WrongSize {
                    expected: RECORD_SIZE,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_unknown_state_still_decodes() {
        let mut bytes = TelemetryLayout::Rev1.encode(&sample());
        bytes[16] = 9;
        let record = TelemetryLayout::Rev1.decode(&bytes).expect("decode");
        assert_eq!(record.state, MachineState::Unknown(9));
        assert_eq!(record.axes, sample().axes);
        assert_eq!(record.played, 42);

        let mut unknown = sample();
        unknown.state = MachineState::Unknown(-4);
        let bytes = TelemetryLayout::Rev2.encode(&unknown);
        assert_eq!(TelemetryLayout::Rev2.decode(&bytes), Ok(unknown));
    }

    #[test]
    fn test_layout_names() {
        let layout: TelemetryLayout = serde_json::from_str("\"rev2\"").expect("parse");
        assert_eq!(layout, TelemetryLayout::Rev2);
    }
}
