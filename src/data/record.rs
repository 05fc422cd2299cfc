//! Sample record and its fixed binary layout.
//!
//! One `SampleRecord` is a snapshot of every sensor channel at one timestamp. The wire form
//! is the contract shared by the ring buffer, the `dump`/`stream` commands and the downlink
//! framer, so it is fixed at compile time and versioned.
//!
//! # Layout (version 1)
//! ```text
//! offset  field                         type
//! 0       timestamp_ms                  u32 LE
//! 4       thermocouple temperatures     4 x f32 LE
//! 20      pressures (kPa)               4 x f32 LE
//! 36      board temperatures            6 x f32 LE
//! 60      bus voltages                  6 x f32 LE
//! 84      currents                      6 x f32 LE
//! 108     powers                        6 x f32 LE
//! 132     power-monitor die temps       6 x f32 LE
//! 156     (end)
//! ```

use bytes::{Buf, BufMut};

use crate::error::{TelemetryError, TelemetryResult};

/// Number of thermocouple channels.
pub const THERMOCOUPLE_CHANNELS: usize = 4;
/// Number of pressure transducer channels.
pub const PRESSURE_CHANNELS: usize = 4;
/// Number of housekeeping board temperature sensors.
pub const BOARD_TEMP_CHANNELS: usize = 6;
/// Number of power-monitor channels (each yields voltage, current, power, die temperature).
pub const POWER_CHANNELS: usize = 6;

/// Version tag of the layout documented above.
pub const RECORD_LAYOUT_VERSION: u8 = 1;

const FLOAT_FIELDS: usize =
    THERMOCOUPLE_CHANNELS + PRESSURE_CHANNELS + BOARD_TEMP_CHANNELS + 4 * POWER_CHANNELS;

/// Encoded size of one record in bytes.
pub const RECORD_SIZE: usize = 4 + FLOAT_FIELDS * 4;

/// One telemetry sample in structured form.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SampleRecord {
    /// Milliseconds since acquisition start, wrapping at 2^32.
    pub timestamp_ms: u32,
    /// Thermocouple temperatures in °C.
    pub temperatures: [f32; THERMOCOUPLE_CHANNELS],
    /// Pressures in kPa.
    pub pressures: [f32; PRESSURE_CHANNELS],
    /// Housekeeping board temperatures in °C.
    pub board_temperatures: [f32; BOARD_TEMP_CHANNELS],
    /// Power-monitor bus voltages in V.
    pub voltages: [f32; POWER_CHANNELS],
    /// Power-monitor currents in A.
    pub currents: [f32; POWER_CHANNELS],
    /// Power-monitor powers in W.
    pub powers: [f32; POWER_CHANNELS],
    /// Power-monitor die temperatures in °C.
    pub die_temperatures: [f32; POWER_CHANNELS],
}

/// A record in its wire form.
///
/// The length is part of the type, so a wrongly sized block can never be handed to the
/// ring buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncodedRecord([u8; RECORD_SIZE]);

impl SampleRecord {
    /// Encode into the canonical little-endian layout.
    pub fn encode(&self) -> EncodedRecord {
        let mut bytes = [0u8; RECORD_SIZE];
        let mut out = &mut bytes[..];

        out.put_u32_le(self.timestamp_ms);
        for group in self.float_groups() {
            for value in group {
                out.put_f32_le(*value);
            }
        }

        EncodedRecord(bytes)
    }

    /// Decode a byte block produced by [`SampleRecord::encode`].
    ///
    /// Fails with `MalformedRecord` unless `bytes` is exactly [`RECORD_SIZE`] long.
    pub fn decode(bytes: &[u8]) -> TelemetryResult<Self> {
        EncodedRecord::try_from(bytes).map(|encoded| encoded.decode())
    }

    fn float_groups(&self) -> [&[f32]; 7] {
        [
            &self.temperatures,
            &self.pressures,
            &self.board_temperatures,
            &self.voltages,
            &self.currents,
            &self.powers,
            &self.die_temperatures,
        ]
    }
}

fn read_array<const N: usize>(src: &mut &[u8]) -> [f32; N] {
    let mut values = [0.0f32; N];
    for value in values.iter_mut() {
        *value = src.get_f32_le();
    }
    values
}

impl EncodedRecord {
    /// Decode into structured form. Infallible: the length was checked on construction.
    pub fn decode(&self) -> SampleRecord {
        let mut src = &self.0[..];
        let timestamp_ms = src.get_u32_le();
        SampleRecord {
            timestamp_ms,
            temperatures: read_array(&mut src),
            pressures: read_array(&mut src),
            board_temperatures: read_array(&mut src),
            voltages: read_array(&mut src),
            currents: read_array(&mut src),
            powers: read_array(&mut src),
            die_temperatures: read_array(&mut src),
        }
    }

    /// Timestamp field without decoding the rest of the record.
    pub fn timestamp_ms(&self) -> u32 {
        u32::from_le_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Raw wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for EncodedRecord {
    type Error = TelemetryError;

    fn try_from(bytes: &[u8]) -> TelemetryResult<Self> {
        let array: [u8; RECORD_SIZE] =
            bytes
                .try_into()
                .map_err(|_| TelemetryError::MalformedRecord {
                    expected: RECORD_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(EncodedRecord(array))
    }
}

impl AsRef<[u8]> for EncodedRecord {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for EncodedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedRecord")
            .field("timestamp_ms", &self.timestamp_ms())
            .field("len", &RECORD_SIZE)
            .finish()
    }
}
