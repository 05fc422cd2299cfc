//! Long-running tasks sharing the ring buffer.
//!
//! - [`acquisition::AcquisitionTask`]: the single writer, one record per period
//! - [`distribution::DistributionTask`]: reader, frames snapshots for the downlink

pub mod acquisition;
pub mod distribution;

pub use acquisition::{remaining_period, AcquisitionState, AcquisitionTask};
pub use distribution::{DistributionOutcome, DistributionTask};
