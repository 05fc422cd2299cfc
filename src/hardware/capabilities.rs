//! Hardware Capabilities
//!
//! The telemetry core never speaks a device register protocol directly. Each physical
//! collaborator is reached through one small capability trait:
//!
//! - A sensor family (thermocouples, pressure ADC, ...) implements `SensorGroup`
//! - A downlink link (serial, CAN bridge, capture file) implements `Transport`
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Focuses on ONE thing
//!
//! Sensor absence is data, not an error: a family that does not answer returns a
//! `GroupReading` with `present = false`, so one dead device never stalls acquisition.
//!
//! # Example
//!
//! ```rust,ignore
//! struct BenchThermocouples { /* ... */ }
//!
//! #[async_trait]
//! impl SensorGroup for BenchThermocouples {
//!     fn name(&self) -> &str { "thermocouples" }
//!     fn channel_count(&self) -> usize { 4 }
//!     async fn read_channel_group(&self) -> GroupReading {
//!         GroupReading::present(vec![21.0, 21.5, 22.0, 22.5])
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;

/// Values read from one sensor family in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReading {
    /// One value per channel, in channel order.
    pub values: Vec<f32>,
    /// Whether the family answered.
    pub present: bool,
}

impl GroupReading {
    /// A successful read.
    pub fn present(values: Vec<f32>) -> Self {
        Self {
            values,
            present: true,
        }
    }

    /// A family that did not answer; values are the zero sentinel.
    pub fn absent(channels: usize) -> Self {
        Self {
            values: vec![0.0; channels],
            present: false,
        }
    }

    /// Whether the reading is usable for a family with `channels` channels.
    ///
    /// A reading with the wrong number of values is treated like an absent one.
    pub fn is_usable(&self, channels: usize) -> bool {
        self.present && self.values.len() == channels
    }

    /// Values as a fixed array, or the zero sentinel when the reading is not usable.
    pub fn values_or_sentinel<const N: usize>(&self) -> [f32; N] {
        let mut out = [0.0; N];
        if self.is_usable(N) {
            out.copy_from_slice(&self.values);
        }
        out
    }

    /// Apply `f(channel, value)` to every value, keeping presence.
    pub fn map_values(&self, mut f: impl FnMut(usize, f32) -> f32) -> Self {
        Self {
            values: self
                .values
                .iter()
                .enumerate()
                .map(|(channel, value)| f(channel, *value))
                .collect(),
            present: self.present,
        }
    }
}

/// Capability: Read a Physical Sensor Family
///
/// # Contract
/// - `read_channel_group` returns one value per channel in channel order
/// - Absence is reported as `present = false`, never as a panic or error
/// - Latency should be small relative to the sampling period; callers still bound it
#[async_trait]
pub trait SensorGroup: Send + Sync {
    /// Family name used in logs and reports
    fn name(&self) -> &str;

    /// Number of channels this family provides
    fn channel_count(&self) -> usize;

    /// Read every channel of the family
    async fn read_channel_group(&self) -> GroupReading;
}

/// Capability: Move Bytes Off the Board
///
/// # Contract
/// - `transmit` sends one complete block; partial writes are an error
/// - `receive` never blocks waiting for data; it returns `None` when nothing is pending
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable description for logs and status output
    fn describe(&self) -> String;

    /// Send one block of bytes
    async fn transmit(&self, bytes: &[u8]) -> Result<()>;

    /// Take any pending inbound bytes
    ///
    /// # Default Implementation
    /// Transmit-only links never have inbound data.
    async fn receive(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}
