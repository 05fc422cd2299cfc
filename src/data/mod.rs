//! Telemetry data path: record codec, ring buffer and downlink framing.
pub mod framer;
pub mod record;
pub mod ring_buffer;

pub use framer::{crc16, frame, unframe, unframe_all, CRC_SIZE};
pub use record::{EncodedRecord, SampleRecord, RECORD_LAYOUT_VERSION, RECORD_SIZE};
pub use ring_buffer::{BufferStatus, RingBuffer, SharedRingBuffer};
