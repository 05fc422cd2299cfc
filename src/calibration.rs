//! Calibration store.
//!
//! Per-channel corrections applied by the sampler before a value enters a sample record:
//!
//! - thermocouples: `celsius = raw + temperature_offset`
//! - pressure: `volts = pressure_slope * raw + pressure_offset`
//!
//! The parameters are loaded once at start. Edits go to the in-memory copy *and* the
//! durable file, but live acquisition keeps the set it was started with; a restart picks
//! up the edits. [`CalibrationStore::restart_required`] reports when the two differ.
//!
//! # Durable Form
//! ```toml
//! version = 1
//! temperature_offsets = [0.0, 0.0, 0.0, 0.0]
//! pressure_slopes = [1.0, 1.0, 1.0, 1.0]
//! pressure_offsets = [0.0, 0.0, 0.0, 0.0]
//! ```
//!
//! The file is only ever replaced whole: serialize into a temporary file in the same
//! directory, fsync, then rename over the target.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::data::record::{PRESSURE_CHANNELS, THERMOCOUPLE_CHANNELS};
use crate::error::{TelemetryError, TelemetryResult};

/// Version tag written to the durable file.
pub const CALIBRATION_FORMAT_VERSION: u32 = 1;

/// A set of per-channel parameters that can be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibrationGroup {
    /// Additive thermocouple offset in °C
    TemperatureOffset,
    /// Multiplicative pressure transducer slope
    PressureSlope,
    /// Additive pressure transducer offset in volts
    PressureOffset,
}

impl CalibrationGroup {
    /// Every group, in walkthrough order.
    pub const ALL: [CalibrationGroup; 3] = [
        CalibrationGroup::TemperatureOffset,
        CalibrationGroup::PressureSlope,
        CalibrationGroup::PressureOffset,
    ];

    /// Name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationGroup::TemperatureOffset => "temp-offset",
            CalibrationGroup::PressureSlope => "pressure-slope",
            CalibrationGroup::PressureOffset => "pressure-offset",
        }
    }

    /// Number of physical channels in the group.
    pub fn size(&self) -> usize {
        match self {
            CalibrationGroup::TemperatureOffset => THERMOCOUPLE_CHANNELS,
            CalibrationGroup::PressureSlope | CalibrationGroup::PressureOffset => {
                PRESSURE_CHANNELS
            }
        }
    }
}

impl fmt::Display for CalibrationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalibrationGroup {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "temp-offset" | "temperature-offset" | "temp" => {
                Ok(CalibrationGroup::TemperatureOffset)
            }
            "pressure-slope" | "slope" => Ok(CalibrationGroup::PressureSlope),
            "pressure-offset" => Ok(CalibrationGroup::PressureOffset),
            _ => Err(TelemetryError::UnknownCalibrationGroup(s.to_string())),
        }
    }
}

/// One staged change to a calibration parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationEdit {
    /// Target group
    pub group: CalibrationGroup,
    /// Channel within the group
    pub channel: usize,
    /// New value
    pub value: f32,
}

impl CalibrationEdit {
    /// Stage `value` for `channel` of `group`.
    pub fn new(group: CalibrationGroup, channel: usize, value: f32) -> Self {
        Self {
            group,
            channel,
            value,
        }
    }

    fn validate(&self) -> TelemetryResult<()> {
        let size = self.group.size();
        if self.channel >= size {
            return Err(TelemetryError::InvalidChannel {
                group: self.group,
                index: self.channel,
                size,
            });
        }
        if !self.value.is_finite() {
            return Err(TelemetryError::InvalidCalibrationValue {
                group: self.group,
                index: self.channel,
                value: self.value,
            });
        }
        Ok(())
    }
}

/// Calibration parameters for every channel group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    /// Thermocouple offsets in °C
    pub temperature_offsets: [f32; THERMOCOUPLE_CHANNELS],
    /// Pressure transducer slopes
    pub pressure_slopes: [f32; PRESSURE_CHANNELS],
    /// Pressure transducer offsets in volts
    pub pressure_offsets: [f32; PRESSURE_CHANNELS],
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            temperature_offsets: [0.0; THERMOCOUPLE_CHANNELS],
            pressure_slopes: [1.0; PRESSURE_CHANNELS],
            pressure_offsets: [0.0; PRESSURE_CHANNELS],
        }
    }
}

impl CalibrationParams {
    /// Values of one group in channel order.
    pub fn group(&self, group: CalibrationGroup) -> &[f32] {
        match group {
            CalibrationGroup::TemperatureOffset => &self.temperature_offsets,
            CalibrationGroup::PressureSlope => &self.pressure_slopes,
            CalibrationGroup::PressureOffset => &self.pressure_offsets,
        }
    }

    fn group_mut(&mut self, group: CalibrationGroup) -> &mut [f32] {
        match group {
            CalibrationGroup::TemperatureOffset => &mut self.temperature_offsets,
            CalibrationGroup::PressureSlope => &mut self.pressure_slopes,
            CalibrationGroup::PressureOffset => &mut self.pressure_offsets,
        }
    }

    /// Corrected thermocouple temperature for `channel`.
    pub fn temperature(&self, channel: usize, raw: f32) -> f32 {
        raw + self.temperature_offsets.get(channel).copied().unwrap_or(0.0)
    }

    /// Corrected pressure transducer voltage for `channel`.
    pub fn pressure_volts(&self, channel: usize, raw: f32) -> f32 {
        let slope = self.pressure_slopes.get(channel).copied().unwrap_or(1.0);
        let offset = self.pressure_offsets.get(channel).copied().unwrap_or(0.0);
        slope * raw + offset
    }

    fn apply(&mut self, edit: &CalibrationEdit) {
        self.group_mut(edit.group)[edit.channel] = edit.value;
    }
}

#[derive(Serialize, Deserialize)]
struct StoredCalibration {
    version: u32,
    #[serde(flatten)]
    params: CalibrationParams,
}

/// Where the parameters in use came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// Read from the durable file
    File,
    /// Defaults; the file was missing or unreadable
    Defaults {
        /// Why the file was not used
        reason: String,
    },
}

/// Durable, serialized calibration parameters.
pub struct CalibrationStore {
    path: PathBuf,
    active: Arc<CalibrationParams>,
    current: Mutex<CalibrationParams>,
    source: LoadSource,
}

impl CalibrationStore {
    /// Load the store from `path`.
    ///
    /// A missing or malformed file is not fatal: the store falls back to zero offsets and
    /// unit slopes and logs why.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (params, source) = match read_params(&path) {
            Ok(params) => {
                info!(path = %path.display(), "Loaded calibration");
                (params, LoadSource::File)
            }
            Err(reason) => {
                warn!(path = %path.display(), %reason, "Using default calibration");
                (CalibrationParams::default(), LoadSource::Defaults { reason })
            }
        };

        Self {
            path,
            active: Arc::new(params.clone()),
            current: Mutex::new(params),
            source,
        }
    }

    /// Durable file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the start-up parameters came from.
    pub fn source(&self) -> &LoadSource {
        &self.source
    }

    /// Parameters loaded at start; these are what live acquisition uses.
    pub fn active(&self) -> Arc<CalibrationParams> {
        Arc::clone(&self.active)
    }

    /// Current in-memory parameters, including edits made since start.
    pub fn snapshot(&self) -> CalibrationParams {
        self.current.lock().clone()
    }

    /// Whether edits are waiting for a restart to take effect.
    pub fn restart_required(&self) -> bool {
        *self.current.lock() != *self.active
    }

    /// Set one parameter and persist.
    pub fn update(
        &self,
        group: CalibrationGroup,
        channel: usize,
        value: f32,
    ) -> TelemetryResult<CalibrationParams> {
        self.update_batch(&[CalibrationEdit::new(group, channel, value)])
    }

    /// Apply several edits as one all-or-nothing change.
    ///
    /// Every edit is validated before anything changes. The in-memory copy is only updated
    /// after the durable file has been replaced.
    pub fn update_batch(&self, edits: &[CalibrationEdit]) -> TelemetryResult<CalibrationParams> {
        for edit in edits {
            edit.validate()?;
        }

        let mut current = self.current.lock();
        let mut candidate = current.clone();
        for edit in edits {
            candidate.apply(edit);
        }

        write_params(&self.path, &candidate)?;
        *current = candidate.clone();
        info!(edits = edits.len(), path = %self.path.display(), "Calibration updated");
        Ok(candidate)
    }

    /// Replace the durable file with zero offsets and unit slopes.
    pub fn reset_to_defaults(&self) -> TelemetryResult<CalibrationParams> {
        let mut current = self.current.lock();
        let defaults = CalibrationParams::default();
        write_params(&self.path, &defaults)?;
        *current = defaults.clone();
        info!(path = %self.path.display(), "Calibration reset to defaults");
        Ok(defaults)
    }
}

fn read_params(path: &Path) -> Result<CalibrationParams, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let stored: StoredCalibration = toml::from_str(&text).map_err(|e| e.to_string())?;
    if stored.version != CALIBRATION_FORMAT_VERSION {
        return Err(format!(
            "unsupported calibration format version {} (expected {})",
            stored.version, CALIBRATION_FORMAT_VERSION
        ));
    }
    Ok(stored.params)
}

fn write_params(path: &Path, params: &CalibrationParams) -> TelemetryResult<()> {
    let failure = |source: std::io::Error| TelemetryError::StorageWriteFailure {
        path: path.display().to_string(),
        source,
    };

    let stored = StoredCalibration {
        version: CALIBRATION_FORMAT_VERSION,
        params: params.clone(),
    };
    let text = toml::to_string_pretty(&stored)
        .map_err(|e| failure(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(failure)?;
    tmp.write_all(text.as_bytes()).map_err(failure)?;
    tmp.as_file().sync_all().map_err(failure)?;
    tmp.persist(path).map_err(|e| failure(e.error))?;
    Ok(())
}
