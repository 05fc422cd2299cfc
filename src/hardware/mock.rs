//! Mock Hardware Implementations
//!
//! Simulated collaborators for running the telemetry core without a board attached.
//! All mocks use async-safe waits (tokio::time::sleep, not std::thread::sleep).
//!
//! # Available Mocks
//!
//! - `SimulatedSensorGroup` - a sensor family with nominal values, optional noise,
//!   optional latency and a presence switch for degraded-hardware scenarios
//! - `MockTransport` - records every transmitted frame and replays queued inbound data

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{
    BoardTemperatureConfig, PowerMonitorConfig, PressureAdcConfig, ThermocoupleConfig,
};
use crate::data::record::PRESSURE_CHANNELS;
use crate::hardware::capabilities::{GroupReading, SensorGroup, Transport};
use crate::hardware::{BOARD_TEMPERATURES, POWER_MONITORS, PRESSURE, THERMOCOUPLES};

// =============================================================================
// SimulatedSensorGroup - Simulated Sensor Family
// =============================================================================

/// Simulated sensor family
///
/// Every read returns the nominal values with optional relative noise. Presence can be
/// flipped at runtime to exercise the absent-sensor paths.
///
/// # Example
///
/// ```rust,ignore
/// let group = SimulatedSensorGroup::fixed("thermocouples", vec![20.0; 4]);
/// group.set_present(false);
/// assert!(!group.read_channel_group().await.present);
/// ```
pub struct SimulatedSensorGroup {
    name: String,
    nominal: Mutex<Vec<f32>>,
    relative_noise: f32,
    latency: Duration,
    present: AtomicBool,
    reads: AtomicU64,
}

impl SimulatedSensorGroup {
    /// Deterministic family returning exactly `values` on every read
    pub fn fixed(name: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            nominal: Mutex::new(values),
            relative_noise: 0.0,
            latency: Duration::ZERO,
            present: AtomicBool::new(true),
            reads: AtomicU64::new(0),
        }
    }

    /// Add relative noise (e.g. 0.005 for ±0.5%) to every read
    pub fn with_noise(mut self, relative_noise: f32) -> Self {
        self.relative_noise = relative_noise;
        self
    }

    /// Delay every read by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Start with the given presence
    pub fn with_present(self, present: bool) -> Self {
        self.set_present(present);
        self
    }

    /// Simulate the family dropping off (or returning to) the bus
    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    /// Replace the nominal values
    pub fn set_values(&self, values: Vec<f32>) {
        *self.nominal.lock() = values;
    }

    /// Number of reads served so far
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Thermocouple converters, one per configured chip select
    pub fn thermocouples(config: &ThermocoupleConfig) -> Self {
        Self::fixed(
            THERMOCOUPLES,
            vec![config.nominal_celsius; config.chip_selects.len()],
        )
        .with_noise(0.01)
        .with_present(config.present)
    }

    /// Multiplexed pressure ADC returning raw transducer volts
    pub fn pressure_adc(config: &PressureAdcConfig) -> Self {
        Self::fixed(PRESSURE, vec![config.nominal_volts; PRESSURE_CHANNELS])
            .with_noise(0.005)
            .with_present(config.present)
    }

    /// Board temperature sensors, one per configured address
    pub fn board_temperatures(config: &BoardTemperatureConfig) -> Self {
        Self::fixed(
            BOARD_TEMPERATURES,
            vec![config.nominal_celsius; config.addresses.len()],
        )
        .with_noise(0.01)
        .with_present(config.present)
    }

    /// Power monitors: 6 voltages, 6 currents, 6 powers, 6 die temperatures
    pub fn power_monitors(config: &PowerMonitorConfig) -> Self {
        let channels = config.addresses.len();
        let mut values = Vec::with_capacity(channels * 4);
        values.extend(std::iter::repeat(config.nominal_volts).take(channels));
        values.extend(std::iter::repeat(config.nominal_amps).take(channels));
        values.extend(
            std::iter::repeat(config.nominal_volts * config.nominal_amps).take(channels),
        );
        values.extend(std::iter::repeat(config.nominal_die_celsius).take(channels));
        Self::fixed(POWER_MONITORS, values)
            .with_noise(0.01)
            .with_present(config.present)
    }
}

#[async_trait]
impl SensorGroup for SimulatedSensorGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_count(&self) -> usize {
        self.nominal.lock().len()
    }

    async fn read_channel_group(&self) -> GroupReading {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        self.reads.fetch_add(1, Ordering::SeqCst);

        let nominal = self.nominal.lock().clone();
        if !self.present.load(Ordering::SeqCst) {
            return GroupReading::absent(nominal.len());
        }

        if self.relative_noise == 0.0 {
            return GroupReading::present(nominal);
        }

        let mut rng = rand::thread_rng();
        let noise = self.relative_noise;
        GroupReading::present(
            nominal
                .into_iter()
                .map(|value| value * (1.0 + rng.gen_range(-noise..noise)))
                .collect(),
        )
    }
}

// =============================================================================
// MockTransport - In-Memory Downlink
// =============================================================================

/// In-memory transport
///
/// Keeps every transmitted block for inspection and hands out queued inbound blocks one
/// per `receive` call. Can be switched into a failing mode to exercise error paths.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    inbound: Mutex<VecDeque<Vec<u8>>>,
    fail_transmit: AtomicBool,
}

impl MockTransport {
    /// Create an empty mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Every block transmitted so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Number of blocks transmitted so far
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Queue a block to be returned by `receive`
    pub fn queue_inbound(&self, bytes: Vec<u8>) {
        self.inbound.lock().push_back(bytes);
    }

    /// Make subsequent `transmit` calls fail
    pub fn set_fail_transmit(&self, fail: bool) {
        self.fail_transmit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn describe(&self) -> String {
        "mock".to_string()
    }

    async fn transmit(&self, bytes: &[u8]) -> Result<()> {
        if self.fail_transmit.load(Ordering::SeqCst) {
            return Err(anyhow!("mock transport configured to fail"));
        }
        self.sent.lock().push(bytes.to_vec());
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.inbound.lock().pop_front())
    }
}
