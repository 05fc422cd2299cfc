//! Configuration System using Figment
//!
//! Configuration is layered from:
//! 1. Built-in defaults (`AppConfig::default()`)
//! 2. A TOML file (optional; missing files are skipped)
//! 3. Environment variables prefixed with `SCI_TELEMETRY_`, nested with `__`
//!
//! Every hardware collaborator receives its own section of this structure through its
//! constructor; nothing reads addresses or pins from ambient global state.
//!
//! # Example
//! ```no_run
//! use sci_telemetry::config::AppConfig;
//!
//! let config = AppConfig::load_from("config/sci_telemetry.toml")?;
//! config.validate()?;
//! println!("Board: {}", config.application.name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data::record::{BOARD_TEMP_CHANNELS, POWER_CHANNELS, THERMOCOUPLE_CHANNELS};
use crate::error::{TelemetryError, TelemetryResult};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/sci_telemetry.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "SCI_TELEMETRY_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Acquisition task settings
    pub acquisition: AcquisitionConfig,
    /// Distribution task and downlink transport settings
    pub distribution: DistributionConfig,
    /// Calibration storage settings
    pub calibration: CalibrationConfig,
    /// Interactive shell settings
    pub shell: ShellConfig,
    /// Sensor collaborator settings
    pub sensors: SensorsConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Board name printed by `version` and `status`
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

/// Acquisition cadence and retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Sampling period in milliseconds
    pub interval_ms: u64,
    /// Number of records retained by the ring buffer
    pub buffer_capacity: usize,
    /// Upper bound on a single sensor-group read before it is treated as absent
    pub read_timeout_ms: u64,
}

/// Downlink distribution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Poll interval between downlink frames in milliseconds
    pub poll_interval_ms: u64,
    /// Transport used for downlink frames
    pub transport: TransportConfig,
}

/// Which transport implementation carries downlink frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-memory sink, frames are only logged
    Mock,
    /// Append frames to a file
    File,
    /// Serial port (requires the `serial` feature)
    Serial,
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Transport implementation
    pub kind: TransportKind,
    /// File path (file transport) or device path (serial transport)
    pub path: Option<PathBuf>,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Serial write timeout in milliseconds
    pub timeout_ms: u64,
}

/// Calibration storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Durable calibration file
    pub path: PathBuf,
}

/// Interactive shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Prompt printed before each command
    pub prompt: String,
    /// Refresh period of `--stream` modes in milliseconds
    pub stream_interval_ms: u64,
}

/// Sensor collaborators, one section per physical family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// Thermocouple converters on the SPI bus
    pub thermocouples: ThermocoupleConfig,
    /// Pressure transducer ADC on the SPI bus
    pub pressure: PressureAdcConfig,
    /// Board temperature sensors on the I2C bus
    pub board_temperatures: BoardTemperatureConfig,
    /// Power monitors on the I2C bus
    pub power_monitors: PowerMonitorConfig,
}

/// Thermocouple converter family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermocoupleConfig {
    /// SPI bus index
    pub spi_bus: u8,
    /// One chip-select pin per channel
    pub chip_selects: Vec<u8>,
    /// Simulated reading in °C
    pub nominal_celsius: f32,
    /// Whether the family answers at all
    pub present: bool,
}

/// Pressure ADC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureAdcConfig {
    /// SPI bus index
    pub spi_bus: u8,
    /// Chip-select pin of the ADC
    pub chip_select: u8,
    /// Simulated transducer output in volts
    pub nominal_volts: f32,
    /// Whether the ADC answers at all
    pub present: bool,
}

/// Board temperature sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardTemperatureConfig {
    /// I2C bus index
    pub i2c_bus: u8,
    /// One address per channel
    pub addresses: Vec<u8>,
    /// Simulated reading in °C
    pub nominal_celsius: f32,
    /// Whether the family answers at all
    pub present: bool,
}

/// Power monitors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerMonitorConfig {
    /// I2C bus index
    pub i2c_bus: u8,
    /// One address per channel
    pub addresses: Vec<u8>,
    /// Simulated bus voltage
    pub nominal_volts: f32,
    /// Simulated current
    pub nominal_amps: f32,
    /// Simulated die temperature in °C
    pub nominal_die_celsius: f32,
    /// Whether the family answers at all
    pub present: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Science PCB".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            buffer_capacity: 120,
            read_timeout_ms: 100,
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            transport: TransportConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Mock,
            path: None,
            baud_rate: 115_200,
            timeout_ms: 100,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("calibration.toml"),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            stream_interval_ms: 500,
        }
    }
}

impl Default for ThermocoupleConfig {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            chip_selects: vec![12, 13, 14, 15],
            nominal_celsius: 22.0,
            present: true,
        }
    }
}

impl Default for PressureAdcConfig {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            chip_select: 17,
            // 14.7 psi on a 0-100 mV = 0-10,000 psi transducer
            nominal_volts: 0.000_147,
            present: true,
        }
    }
}

impl Default for BoardTemperatureConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 0,
            addresses: vec![0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x4D],
            nominal_celsius: 25.0,
            present: true,
        }
    }
}

impl Default for PowerMonitorConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 0,
            addresses: vec![0x40, 0x41, 0x42, 0x43, 0x44, 0x45],
            nominal_volts: 5.0,
            nominal_amps: 0.12,
            nominal_die_celsius: 30.0,
            present: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path and environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// Environment variables override the file, e.g.
    /// `SCI_TELEMETRY_ACQUISITION__INTERVAL_MS=250`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> TelemetryResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(TelemetryError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return Err(TelemetryError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        if self.acquisition.buffer_capacity == 0 {
            return Err(TelemetryError::InvalidBufferCapacity);
        }

        for (name, value) in [
            ("acquisition.interval_ms", self.acquisition.interval_ms),
            ("acquisition.read_timeout_ms", self.acquisition.read_timeout_ms),
            ("distribution.poll_interval_ms", self.distribution.poll_interval_ms),
            ("shell.stream_interval_ms", self.shell.stream_interval_ms),
        ] {
            if value == 0 {
                return Err(TelemetryError::Configuration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let transport = &self.distribution.transport;
        if matches!(transport.kind, TransportKind::File | TransportKind::Serial)
            && transport.path.is_none()
        {
            return Err(TelemetryError::Configuration(format!(
                "distribution.transport.path is required for the {:?} transport",
                transport.kind
            )));
        }

        let sensors = &self.sensors;
        check_channel_list(
            "sensors.thermocouples.chip_selects",
            &sensors.thermocouples.chip_selects,
            THERMOCOUPLE_CHANNELS,
        )?;
        check_channel_list(
            "sensors.board_temperatures.addresses",
            &sensors.board_temperatures.addresses,
            BOARD_TEMP_CHANNELS,
        )?;
        check_channel_list(
            "sensors.power_monitors.addresses",
            &sensors.power_monitors.addresses,
            POWER_CHANNELS,
        )?;
        Ok(())
    }

    /// Sampling period
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.acquisition.interval_ms)
    }

    /// Distribution poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.distribution.poll_interval_ms)
    }

    /// Bound on one sensor-group read
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition.read_timeout_ms)
    }

    /// Refresh period of streaming shell modes
    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.shell.stream_interval_ms)
    }
}

fn check_channel_list(name: &str, list: &[u8], expected: usize) -> TelemetryResult<()> {
    if list.len() != expected {
        return Err(TelemetryError::Configuration(format!(
            "{name} must list exactly {expected} entries, found {}",
            list.len()
        )));
    }
    let mut seen = std::collections::HashSet::new();
    for entry in list {
        if !seen.insert(entry) {
            return Err(TelemetryError::Configuration(format!(
                "{name} contains duplicate entry 0x{entry:02X}"
            )));
        }
    }
    Ok(())
}
