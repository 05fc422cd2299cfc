//! Self-test evaluation.
//!
//! Bounds-checks one pass of readings against a static plausibility band per channel class
//! and checks the buffer's health. Evaluation never fails: a family that did not answer
//! shows up as failed channels in the report.

use std::fmt;
use std::ops::RangeInclusive;

use crate::data::record::{
    BOARD_TEMP_CHANNELS, POWER_CHANNELS, PRESSURE_CHANNELS, THERMOCOUPLE_CHANNELS,
};
use crate::data::BufferStatus;
use crate::hardware::GroupReading;
use crate::sampling::Readings;

/// Physical quantity measured by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelClass {
    /// Type K thermocouple, °C
    Thermocouple,
    /// Pressure transducer, kPa
    Pressure,
    /// Board temperature sensor, °C
    BoardTemperature,
    /// Power-monitor bus voltage, V
    Voltage,
    /// Power-monitor current, A
    Current,
    /// Power-monitor power, W
    Power,
    /// Power-monitor die temperature, °C
    DieTemperature,
}

impl ChannelClass {
    /// Admissible range of values for the class.
    pub fn band(&self) -> RangeInclusive<f32> {
        match self {
            ChannelClass::Thermocouple => -200.0..=1372.0,
            ChannelClass::Pressure => -100.0..=70_000.0,
            ChannelClass::BoardTemperature => -55.0..=150.0,
            ChannelClass::Voltage => 0.0..=85.0,
            ChannelClass::Current => -10.0..=10.0,
            ChannelClass::Power => 0.0..=100.0,
            ChannelClass::DieTemperature => -40.0..=125.0,
        }
    }

    /// Short label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            ChannelClass::Thermocouple => "TC",
            ChannelClass::Pressure => "PRESSURE",
            ChannelClass::BoardTemperature => "BOARD_TEMP",
            ChannelClass::Voltage => "VOLTAGE",
            ChannelClass::Current => "CURRENT",
            ChannelClass::Power => "POWER",
            ChannelClass::DieTemperature => "DIE_TEMP",
        }
    }

    /// Unit suffix used in reports.
    pub fn unit(&self) -> &'static str {
        match self {
            ChannelClass::Thermocouple
            | ChannelClass::BoardTemperature
            | ChannelClass::DieTemperature => "C",
            ChannelClass::Pressure => "kPa",
            ChannelClass::Voltage => "V",
            ChannelClass::Current => "A",
            ChannelClass::Power => "W",
        }
    }
}

/// Outcome for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCheck {
    /// Class of the channel
    pub class: ChannelClass,
    /// Index within the class
    pub channel: usize,
    /// Value seen (zero sentinel when absent)
    pub value: f32,
    /// Whether the owning family answered
    pub present: bool,
    /// Present and inside the class band
    pub passed: bool,
}

/// Outcome for the sample buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferCheck {
    /// Buffer occupancy at evaluation time
    pub status: BufferStatus,
    /// Whether the buffer is healthy
    pub passed: bool,
}

/// Full self-test result.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfTestReport {
    /// One entry per channel, grouped by family
    pub channels: Vec<ChannelCheck>,
    /// Buffer health
    pub buffer: BufferCheck,
}

impl SelfTestReport {
    /// Number of passing checks, buffer included.
    pub fn passed_count(&self) -> usize {
        self.channels.iter().filter(|c| c.passed).count() + usize::from(self.buffer.passed)
    }

    /// Number of failing checks, buffer included.
    pub fn failed_count(&self) -> usize {
        self.channels.iter().filter(|c| !c.passed).count() + usize::from(!self.buffer.passed)
    }

    /// Whether every check passed.
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Failing channel checks.
    pub fn failures(&self) -> impl Iterator<Item = &ChannelCheck> {
        self.channels.iter().filter(|c| !c.passed)
    }
}

impl fmt::Display for SelfTestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.channels {
            let verdict = if check.passed { "PASS" } else { "FAIL" };
            if check.present {
                writeln!(
                    f,
                    "{:<10} {:>2}  {:>10.3} {:<3}  {}",
                    check.class.label(),
                    check.channel,
                    check.value,
                    check.class.unit(),
                    verdict
                )?;
            } else {
                writeln!(
                    f,
                    "{:<10} {:>2}  {:>14}  {}",
                    check.class.label(),
                    check.channel,
                    "ABSENT",
                    verdict
                )?;
            }
        }
        writeln!(
            f,
            "BUFFER         {}/{}  {}",
            self.buffer.status.size,
            self.buffer.status.capacity,
            if self.buffer.passed { "PASS" } else { "FAIL" }
        )?;
        write!(
            f,
            "Result: {} passed, {} failed",
            self.passed_count(),
            self.failed_count()
        )
    }
}

/// Evaluate one pass of readings and the buffer status.
pub fn evaluate(readings: &Readings, buffer: BufferStatus) -> SelfTestReport {
    let mut channels = Vec::with_capacity(
        THERMOCOUPLE_CHANNELS + PRESSURE_CHANNELS + BOARD_TEMP_CHANNELS + 4 * POWER_CHANNELS,
    );

    check_group(
        &mut channels,
        &readings.thermocouples,
        0,
        THERMOCOUPLE_CHANNELS,
        ChannelClass::Thermocouple,
    );
    check_group(
        &mut channels,
        &readings.pressures,
        0,
        PRESSURE_CHANNELS,
        ChannelClass::Pressure,
    );
    check_group(
        &mut channels,
        &readings.board_temperatures,
        0,
        BOARD_TEMP_CHANNELS,
        ChannelClass::BoardTemperature,
    );

    // Power monitors share one reading: V[6], I[6], P[6], T[6]
    let power_classes = [
        ChannelClass::Voltage,
        ChannelClass::Current,
        ChannelClass::Power,
        ChannelClass::DieTemperature,
    ];
    for (block, class) in power_classes.into_iter().enumerate() {
        check_group(
            &mut channels,
            &readings.power_monitors,
            block * POWER_CHANNELS,
            POWER_CHANNELS,
            class,
        );
    }

    SelfTestReport {
        channels,
        buffer: BufferCheck {
            status: buffer,
            passed: buffer.capacity > 0,
        },
    }
}

fn check_group(
    out: &mut Vec<ChannelCheck>,
    reading: &GroupReading,
    start: usize,
    count: usize,
    class: ChannelClass,
) {
    let band = class.band();
    for channel in 0..count {
        let value = reading.values.get(start + channel).copied();
        let present = reading.present && value.is_some();
        let value = value.unwrap_or(0.0);
        out.push(ChannelCheck {
            class,
            channel,
            value,
            present,
            passed: present && band.contains(&value),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleRecord;

    fn nominal() -> Readings {
        Readings::from_record(&SampleRecord {
            timestamp_ms: 1000,
            temperatures: [22.0; 4],
            pressures: [101.3; 4],
            board_temperatures: [25.0; 6],
            voltages: [5.0; 6],
            currents: [0.12; 6],
            powers: [0.6; 6],
            die_temperatures: [30.0; 6],
        })
    }

    fn status(size: usize, capacity: usize) -> BufferStatus {
        BufferStatus { size, capacity }
    }

    #[test]
    fn nominal_readings_pass() {
        let report = evaluate(&nominal(), status(10, 120));
        assert_eq!(report.channels.len(), 38);
        assert!(report.all_passed());
        assert_eq!(report.passed_count(), 39);
    }

    #[test]
    fn absent_group_fails_every_channel() {
        let mut readings = nominal();
        readings.board_temperatures = GroupReading::absent(6);

        let report = evaluate(&readings, status(0, 120));
        let board: Vec<_> = report
            .channels
            .iter()
            .filter(|c| c.class == ChannelClass::BoardTemperature)
            .collect();
        assert_eq!(board.len(), 6);
        assert!(board.iter().all(|c| !c.passed && !c.present));
        assert_eq!(report.failed_count(), 6);
        assert_eq!(report.channels.len(), 38);
    }

    #[test]
    fn short_power_reading_fails_missing_channels() {
        let mut readings = nominal();
        readings.power_monitors = GroupReading::present(vec![5.0; 6]);

        let report = evaluate(&readings, status(1, 120));
        assert_eq!(report.failed_count(), 18);
        assert!(report
            .failures()
            .all(|c| c.class != ChannelClass::Voltage));
    }

    #[test]
    fn out_of_band_value_fails() {
        let mut readings = nominal();
        readings.power_monitors.values[POWER_CHANNELS] = 50.0; // current channel 0
        readings.thermocouples.values[2] = f32::NAN;

        let report = evaluate(&readings, status(1, 120));
        let failed: Vec<_> = report.failures().map(|c| (c.class, c.channel)).collect();
        assert_eq!(
            failed,
            vec![(ChannelClass::Thermocouple, 2), (ChannelClass::Current, 0)]
        );
    }

    #[test]
    fn zero_capacity_buffer_fails() {
        let report = evaluate(&nominal(), status(0, 0));
        assert!(!report.buffer.passed);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn report_renders_summary() {
        let mut readings = nominal();
        readings.pressures = GroupReading::absent(4);
        let text = evaluate(&readings, status(3, 120)).to_string();
        assert!(text.contains("ABSENT"));
        assert!(text.ends_with("Result: 35 passed, 4 failed"));
    }
}
