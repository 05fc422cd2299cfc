//! Hardware collaborators.
//!
//! Sensor families and downlink transports are reached only through the capability
//! traits in [`capabilities`]. Register-level drivers live outside this crate; the host
//! build wires in the simulated implementations from [`mock`].

pub mod capabilities;
pub mod mock;
pub mod transport;

pub use capabilities::{GroupReading, SensorGroup, Transport};
pub use mock::{MockTransport, SimulatedSensorGroup};
pub use transport::{build_transport, FileTransport};

/// Family name of the thermocouple converters.
pub const THERMOCOUPLES: &str = "thermocouples";
/// Family name of the pressure ADC.
pub const PRESSURE: &str = "pressure";
/// Family name of the board temperature sensors.
pub const BOARD_TEMPERATURES: &str = "board-temperatures";
/// Family name of the power monitors.
pub const POWER_MONITORS: &str = "power-monitors";
