//! # Science PCB Telemetry Core
//!
//! Telemetry core of a spacecraft instrument board. It samples the board's sensors on a
//! fixed cadence, packs every pass into a fixed-width binary record, keeps a bounded
//! history in a ring buffer and hands that history to a downlink transport and to a
//! maintenance command shell. Per-channel calibration is persisted and applied at read
//! time; edits take effect after a restart.
//!
//! ## Crate Structure
//!
//! - **`data`**: the sample record codec, the shared ring buffer and the CRC-16 framer.
//! - **`calibration`**: the durable calibration store and the parameter model.
//! - **`hardware`**: capability traits for sensor families and transports, plus the
//!   simulated and host-side implementations.
//! - **`sampling`**: reads every sensor family with a bounded latency and applies
//!   calibration.
//! - **`selftest`**: per-channel plausibility checks over one pass of readings.
//! - **`tasks`**: the acquisition (single writer) and distribution (reader) tasks.
//! - **`shell`**: the maintenance command shell.
//! - **`app`**: assembles one running instance and tears it down again.
//! - **`config`**: layered configuration (defaults, TOML file, environment).
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: the `TelemetryError` enum.
//!
//! ## Data Flow
//! ```text
//! sensors -> Sampler -> calibration -> SampleRecord -> SharedRingBuffer
//!                                                  |-> DistributionTask -> frame -> Transport
//!                                                  `-> Shell -> text / calibration edits
//! ```

pub mod app;
pub mod calibration;
pub mod config;
pub mod data;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod sampling;
pub mod selftest;
pub mod shell;
pub mod tasks;

pub use app::TelemetryApp;
pub use error::{TelemetryError, TelemetryResult};
