//! Sensor sampling.
//!
//! `Sampler` reads the four sensor families concurrently, bounds every read by the
//! configured timeout and applies the calibration loaded at start. A family that times out,
//! reports absent or returns the wrong number of values is replaced by the zero sentinel,
//! so one dead device never stalls a cycle.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::debug;

use crate::calibration::CalibrationParams;
use crate::config::{AppConfig, SensorsConfig};
use crate::data::record::{
    SampleRecord, BOARD_TEMP_CHANNELS, POWER_CHANNELS, PRESSURE_CHANNELS, THERMOCOUPLE_CHANNELS,
};
use crate::hardware::{GroupReading, SensorGroup, SimulatedSensorGroup};

/// Values per power-monitor reading (voltage, current, power, die temperature per channel).
pub const POWER_MONITOR_VALUES: usize = POWER_CHANNELS * 4;

/// Pressure transducer output at full scale, in volts.
const TRANSDUCER_FULL_SCALE_VOLTS: f32 = 0.1;
/// Pressure transducer full-scale range, in psi.
const TRANSDUCER_FULL_SCALE_PSI: f32 = 10_000.0;
const KPA_PER_PSI: f32 = 6.89476;

/// Convert a calibrated transducer voltage to kPa.
pub fn volts_to_kpa(volts: f32) -> f32 {
    volts / TRANSDUCER_FULL_SCALE_VOLTS * TRANSDUCER_FULL_SCALE_PSI * KPA_PER_PSI
}

/// The four sensor families the board carries.
#[derive(Clone)]
pub struct SensorSet {
    /// Thermocouple converters
    pub thermocouples: Arc<dyn SensorGroup>,
    /// Pressure ADC
    pub pressure: Arc<dyn SensorGroup>,
    /// Housekeeping board temperature sensors
    pub board_temperatures: Arc<dyn SensorGroup>,
    /// Power monitors
    pub power_monitors: Arc<dyn SensorGroup>,
}

impl SensorSet {
    /// Simulated families built from the sensor configuration.
    pub fn simulated(config: &SensorsConfig) -> Self {
        Self {
            thermocouples: Arc::new(SimulatedSensorGroup::thermocouples(&config.thermocouples)),
            pressure: Arc::new(SimulatedSensorGroup::pressure_adc(&config.pressure)),
            board_temperatures: Arc::new(SimulatedSensorGroup::board_temperatures(
                &config.board_temperatures,
            )),
            power_monitors: Arc::new(SimulatedSensorGroup::power_monitors(
                &config.power_monitors,
            )),
        }
    }

    /// Families whose declared channel count differs from the record layout, as
    /// `(name, declared, expected)`. Such a family reads as absent on every cycle.
    pub fn layout_mismatches(&self) -> Vec<(&str, usize, usize)> {
        [
            (&self.thermocouples, THERMOCOUPLE_CHANNELS),
            (&self.pressure, PRESSURE_CHANNELS),
            (&self.board_temperatures, BOARD_TEMP_CHANNELS),
            (&self.power_monitors, POWER_MONITOR_VALUES),
        ]
        .into_iter()
        .filter_map(|(group, expected)| {
            let declared = group.channel_count();
            (declared != expected).then(|| (group.name(), declared, expected))
        })
        .collect()
    }
}

/// Uncalibrated values of one pass over every family.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReadings {
    /// Thermocouple temperatures in °C
    pub thermocouples: GroupReading,
    /// Pressure transducer outputs in volts
    pub pressure: GroupReading,
    /// Board temperatures in °C
    pub board_temperatures: GroupReading,
    /// 6 voltages, 6 currents, 6 powers, 6 die temperatures
    pub power_monitors: GroupReading,
}

/// Calibrated values of one pass, stamped with the acquisition clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Readings {
    /// Milliseconds since acquisition start, wrapping at 2^32
    pub timestamp_ms: u32,
    /// Thermocouple temperatures in °C
    pub thermocouples: GroupReading,
    /// Pressures in kPa
    pub pressures: GroupReading,
    /// Board temperatures in °C
    pub board_temperatures: GroupReading,
    /// 6 voltages, 6 currents, 6 powers, 6 die temperatures
    pub power_monitors: GroupReading,
}

impl Readings {
    /// Build the record; absent families become zeros.
    pub fn to_record(&self) -> SampleRecord {
        let power: [f32; POWER_MONITOR_VALUES] = self.power_monitors.values_or_sentinel();
        let mut record = SampleRecord {
            timestamp_ms: self.timestamp_ms,
            temperatures: self.thermocouples.values_or_sentinel(),
            pressures: self.pressures.values_or_sentinel(),
            board_temperatures: self.board_temperatures.values_or_sentinel(),
            ..Default::default()
        };
        record
            .voltages
            .copy_from_slice(&power[..POWER_CHANNELS]);
        record
            .currents
            .copy_from_slice(&power[POWER_CHANNELS..2 * POWER_CHANNELS]);
        record
            .powers
            .copy_from_slice(&power[2 * POWER_CHANNELS..3 * POWER_CHANNELS]);
        record
            .die_temperatures
            .copy_from_slice(&power[3 * POWER_CHANNELS..]);
        record
    }

    /// Rebuild readings from a stored record. Every family counts as present.
    pub fn from_record(record: &SampleRecord) -> Self {
        let mut power = Vec::with_capacity(POWER_MONITOR_VALUES);
        power.extend_from_slice(&record.voltages);
        power.extend_from_slice(&record.currents);
        power.extend_from_slice(&record.powers);
        power.extend_from_slice(&record.die_temperatures);
        Self {
            timestamp_ms: record.timestamp_ms,
            thermocouples: GroupReading::present(record.temperatures.to_vec()),
            pressures: GroupReading::present(record.pressures.to_vec()),
            board_temperatures: GroupReading::present(record.board_temperatures.to_vec()),
            power_monitors: GroupReading::present(power),
        }
    }

    /// Families that did not produce a usable reading.
    pub fn absent_groups(&self) -> Vec<&'static str> {
        use crate::hardware::{BOARD_TEMPERATURES, POWER_MONITORS, PRESSURE, THERMOCOUPLES};

        [
            (THERMOCOUPLES, &self.thermocouples, THERMOCOUPLE_CHANNELS),
            (PRESSURE, &self.pressures, PRESSURE_CHANNELS),
            (BOARD_TEMPERATURES, &self.board_temperatures, BOARD_TEMP_CHANNELS),
            (POWER_MONITORS, &self.power_monitors, POWER_MONITOR_VALUES),
        ]
        .into_iter()
        .filter(|(_, reading, channels)| !reading.is_usable(*channels))
        .map(|(name, _, _)| name)
        .collect()
    }
}

/// Reads every sensor family and applies calibration.
#[derive(Clone)]
pub struct Sampler {
    sensors: SensorSet,
    calibration: Arc<CalibrationParams>,
    read_timeout: Duration,
    start: Instant,
}

impl Sampler {
    /// Sampler over `sensors` using `calibration` for every read.
    pub fn new(
        sensors: SensorSet,
        calibration: Arc<CalibrationParams>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            sensors,
            calibration,
            read_timeout,
            start: Instant::now(),
        }
    }

    /// Sampler over simulated families configured from `config`.
    pub fn from_config(config: &AppConfig, calibration: Arc<CalibrationParams>) -> Self {
        Self::new(
            SensorSet::simulated(&config.sensors),
            calibration,
            config.read_timeout(),
        )
    }

    /// Calibration this sampler applies.
    pub fn calibration(&self) -> &CalibrationParams {
        &self.calibration
    }

    /// The sensor families.
    pub fn sensors(&self) -> &SensorSet {
        &self.sensors
    }

    /// Milliseconds since the sampler was created, wrapping at 2^32.
    pub fn timestamp_ms(&self) -> u32 {
        // Truncation is the wrap.
        self.start.elapsed().as_millis() as u32
    }

    /// Read every family concurrently, without calibration.
    pub async fn read_raw(&self) -> RawReadings {
        let (thermocouples, pressure, board_temperatures, power_monitors) = tokio::join!(
            self.read_group(&self.sensors.thermocouples, THERMOCOUPLE_CHANNELS),
            self.read_group(&self.sensors.pressure, PRESSURE_CHANNELS),
            self.read_group(&self.sensors.board_temperatures, BOARD_TEMP_CHANNELS),
            self.read_group(&self.sensors.power_monitors, POWER_MONITOR_VALUES),
        );
        RawReadings {
            thermocouples,
            pressure,
            board_temperatures,
            power_monitors,
        }
    }

    /// Apply calibration and unit conversion to a raw pass.
    pub fn calibrate(&self, raw: RawReadings) -> Readings {
        let calibration = &self.calibration;
        Readings {
            timestamp_ms: self.timestamp_ms(),
            thermocouples: calibrated(&raw.thermocouples, |channel, value| {
                calibration.temperature(channel, value)
            }),
            pressures: calibrated(&raw.pressure, |channel, value| {
                volts_to_kpa(calibration.pressure_volts(channel, value))
            }),
            board_temperatures: raw.board_temperatures,
            power_monitors: raw.power_monitors,
        }
    }

    /// One full pass: read and calibrate.
    pub async fn sample(&self) -> Readings {
        let raw = self.read_raw().await;
        self.calibrate(raw)
    }

    async fn read_group(&self, group: &Arc<dyn SensorGroup>, channels: usize) -> GroupReading {
        match timeout(self.read_timeout, group.read_channel_group()).await {
            Ok(reading) if reading.is_usable(channels) => reading,
            Ok(reading) => {
                debug!(
                    group = group.name(),
                    present = reading.present,
                    values = reading.values.len(),
                    expected = channels,
                    "Sensor group unusable"
                );
                GroupReading::absent(channels)
            }
            Err(_) => {
                debug!(
                    group = group.name(),
                    timeout = ?self.read_timeout,
                    "Sensor read timed out"
                );
                GroupReading::absent(channels)
            }
        }
    }
}

fn calibrated(reading: &GroupReading, f: impl FnMut(usize, f32) -> f32) -> GroupReading {
    if reading.present {
        reading.map_values(f)
    } else {
        reading.clone()
    }
}
