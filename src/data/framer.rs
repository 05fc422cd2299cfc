//! Integrity framing for downlink transport.
//!
//! A frame is the concatenation of encoded records followed by a CRC-16 of that payload,
//! stored as two little-endian bytes:
//!
//! ```text
//! [record 0][record 1]...[record n-1][crc lo][crc hi]
//! ```
//!
//! The checksum is CRC-16/MODBUS: reflected polynomial 0xA001 (0x8005 unreflected),
//! initial value 0xFFFF, no final XOR. The receiving side must use the same parameters.

use crc::{Crc, CRC_16_MODBUS};

use crate::data::record::{EncodedRecord, RECORD_SIZE};
use crate::error::{TelemetryError, TelemetryResult};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Size of the checksum trailer in bytes.
pub const CRC_SIZE: usize = 2;

/// CRC-16 (poly 0xA001 reflected, init 0xFFFF) over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Build a downlink frame from records in the order given.
///
/// Returns `None` when there is nothing to send.
pub fn frame(records: &[EncodedRecord]) -> Option<Vec<u8>> {
    if records.is_empty() {
        return None;
    }

    let mut out = Vec::with_capacity(records.len() * RECORD_SIZE + CRC_SIZE);
    for record in records {
        out.extend_from_slice(record.as_bytes());
    }
    let crc = crc16(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    Some(out)
}

/// Check a frame's trailer and split its payload back into records.
pub fn unframe(bytes: &[u8]) -> TelemetryResult<Vec<EncodedRecord>> {
    if bytes.len() < CRC_SIZE {
        return Err(TelemetryError::MalformedRecord {
            expected: RECORD_SIZE + CRC_SIZE,
            actual: bytes.len(),
        });
    }

    let (payload, trailer) = bytes.split_at(bytes.len() - CRC_SIZE);
    let received = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = crc16(payload);
    if received != computed {
        return Err(TelemetryError::ChecksumMismatch { computed, received });
    }

    if payload.is_empty() || payload.len() % RECORD_SIZE != 0 {
        return Err(TelemetryError::MalformedRecord {
            expected: RECORD_SIZE,
            actual: payload.len() % RECORD_SIZE,
        });
    }

    payload
        .chunks_exact(RECORD_SIZE)
        .map(EncodedRecord::try_from)
        .collect()
}

/// Split a capture of back-to-back frames into their records.
///
/// Frames carry no length field, so each boundary is the shortest whole number of records
/// whose trailer checks out.
///
/// A prefix whose CRC matches by coincidence (about 1 in 65536 per candidate boundary) is
/// taken as a frame, which splits the real frame in two. Nothing in the frame format can
/// rule this out; captures that must be split exactly need an external record count.
pub fn unframe_all(bytes: &[u8]) -> TelemetryResult<Vec<Vec<EncodedRecord>>> {
    let mut frames = Vec::new();
    let mut rest = bytes;

    while !rest.is_empty() {
        let boundary = (1..=rest.len() / RECORD_SIZE)
            .map(|count| count * RECORD_SIZE + CRC_SIZE)
            .take_while(|len| *len <= rest.len())
            .find(|len| unframe(&rest[..*len]).is_ok());

        let Some(len) = boundary else {
            // Report why the remainder does not parse
            unframe(rest)?;
            return Err(TelemetryError::MalformedRecord {
                expected: RECORD_SIZE + CRC_SIZE,
                actual: rest.len(),
            });
        };
        frames.push(unframe(&rest[..len])?);
        rest = &rest[len..];
    }

    Ok(frames)
}
