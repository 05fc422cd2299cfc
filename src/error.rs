//! Custom error types for the telemetry core.
//!
//! `TelemetryError` is the single error enum for the library. Each variant maps to one
//! fault class and the policy attached to it:
//!
//! - **`MalformedRecord`**: a byte block could not be decoded as a sample record (length
//!   mismatch). The record is discarded and processing continues.
//! - **`ChecksumMismatch`**: a received frame failed its CRC-16 check.
//! - **`SensorAbsent`**: a physical sensor family did not respond. Acquisition substitutes
//!   the sentinel value and carries on; the condition is surfaced in self-test and status.
//! - **`InvalidChannel`** / **`UnknownCalibrationGroup`**: a calibration edit addressed a
//!   channel or group that does not exist. Nothing is mutated.
//! - **`InvalidCalibrationValue`**: a calibration edit carried NaN or an infinity. Nothing is
//!   mutated.
//! - **`StorageWriteFailure`**: the durable calibration file could not be replaced. The prior
//!   file and the in-memory parameters are both left untouched.
//! - **`Configuration`** / **`InvalidBufferCapacity`**: semantic configuration errors caught
//!   during validation.
//!
//! None of these are fatal to the process.

use thiserror::Error;

use crate::calibration::CalibrationGroup;

/// Convenience alias for results using the library error type.
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Malformed record: expected {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },

    #[error("Checksum mismatch: frame carries 0x{received:04X}, payload computes 0x{computed:04X}")]
    ChecksumMismatch { computed: u16, received: u16 },

    #[error("Sensor group '{0}' is absent")]
    SensorAbsent(String),

    #[error("Invalid channel {index} for calibration group '{group}' (group has {size} channels)")]
    InvalidChannel {
        group: CalibrationGroup,
        index: usize,
        size: usize,
    },

    #[error("Calibration value {value} for '{group}'[{index}] is not a finite number")]
    InvalidCalibrationValue {
        group: CalibrationGroup,
        index: usize,
        value: f32,
    },

    #[error(
        "Unknown calibration group '{0}'. Expected one of: temp-offset, pressure-slope, \
         pressure-offset"
    )]
    UnknownCalibrationGroup(String),

    #[error("Failed to write calibration storage '{path}': {source}")]
    StorageWriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Buffer capacity must be greater than zero")]
    InvalidBufferCapacity,

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
