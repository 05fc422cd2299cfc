//! Fixed-capacity ring buffer of encoded sample records.
//!
//! The buffer keeps the most recent `capacity` records and silently discards the oldest
//! one when full. There is no backpressure: overwrite-oldest is the flow-control policy.
//!
//! # Slot Layout
//! ```text
//! slots:        [ r3 | r4 | r1 | r2 ]      capacity = 4, count = 4
//!                         ^
//!                    write_index (oldest record, next slot to be overwritten)
//! ```
//!
//! `RingBuffer` itself is a plain single-threaded structure. `SharedRingBuffer` wraps it in
//! one mutex so that the acquisition task (the only writer) and any number of readers see
//! every multi-field operation atomically. The lock is only ever held for the duration of a
//! single buffer operation.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::data::record::{EncodedRecord, RECORD_SIZE};
use crate::error::{TelemetryError, TelemetryResult};

/// Ring buffer of encoded records.
pub struct RingBuffer {
    slots: Vec<EncodedRecord>,
    capacity: usize,
    write_index: usize,
    count: usize,
}

/// Point-in-time usage of a ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    /// Records currently retained.
    pub size: usize,
    /// Maximum records retained.
    pub capacity: usize,
}

impl BufferStatus {
    /// Whether the next push discards the oldest record.
    pub fn is_full(&self) -> bool {
        self.size >= self.capacity
    }

    /// Free slots before the buffer starts overwriting.
    pub fn free(&self) -> usize {
        self.capacity.saturating_sub(self.size)
    }

    /// Usage as a percentage of capacity (0 when capacity is 0).
    pub fn usage_percent(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 / self.capacity as f64 * 100.0
        }
    }
}

impl RingBuffer {
    /// Create an empty buffer holding at most `capacity` records.
    ///
    /// Storage for every slot is allocated up front and never released by `clear`.
    pub fn new(capacity: usize) -> TelemetryResult<Self> {
        if capacity == 0 {
            return Err(TelemetryError::InvalidBufferCapacity);
        }

        let empty = EncodedRecord::try_from(&[0u8; RECORD_SIZE][..])?;
        Ok(Self {
            slots: vec![empty; capacity],
            capacity,
            write_index: 0,
            count: 0,
        })
    }

    /// Store a record, discarding the oldest one if the buffer is full.
    pub fn push(&mut self, record: EncodedRecord) {
        self.slots[self.write_index] = record;
        self.write_index = (self.write_index + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    /// All retained records, oldest first.
    pub fn snapshot_all(&self) -> Vec<EncodedRecord> {
        if self.count < self.capacity {
            self.slots[..self.count].to_vec()
        } else {
            let mut records = Vec::with_capacity(self.capacity);
            records.extend_from_slice(&self.slots[self.write_index..]);
            records.extend_from_slice(&self.slots[..self.write_index]);
            records
        }
    }

    /// Most recently pushed record, if any.
    pub fn latest(&self) -> Option<EncodedRecord> {
        if self.count == 0 {
            return None;
        }
        let index = (self.write_index + self.capacity - 1) % self.capacity;
        Some(self.slots[index])
    }

    /// Forget every record. Storage stays allocated.
    pub fn clear(&mut self) {
        self.write_index = 0;
        self.count = 0;
    }

    /// Whether the next push overwrites the oldest record.
    pub fn is_full(&self) -> bool {
        self.count >= self.capacity
    }

    /// Number of retained records.
    pub fn size(&self) -> usize {
        self.count
    }

    /// Maximum number of retained records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size and capacity together.
    pub fn status(&self) -> BufferStatus {
        BufferStatus {
            size: self.count,
            capacity: self.capacity,
        }
    }
}

/// Cloneable handle to a ring buffer shared between tasks.
///
/// Every method takes the lock exactly once, so a snapshot always reflects a state that
/// existed at a single instant.
#[derive(Clone)]
pub struct SharedRingBuffer {
    inner: Arc<Mutex<RingBuffer>>,
}

impl SharedRingBuffer {
    /// Create a shared buffer holding at most `capacity` records.
    pub fn new(capacity: usize) -> TelemetryResult<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(RingBuffer::new(capacity)?)),
        })
    }

    /// See [`RingBuffer::push`].
    pub fn push(&self, record: EncodedRecord) {
        self.inner.lock().push(record);
    }

    /// See [`RingBuffer::snapshot_all`].
    pub fn snapshot_all(&self) -> Vec<EncodedRecord> {
        self.inner.lock().snapshot_all()
    }

    /// See [`RingBuffer::latest`].
    pub fn latest(&self) -> Option<EncodedRecord> {
        self.inner.lock().latest()
    }

    /// See [`RingBuffer::clear`].
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// See [`RingBuffer::is_full`].
    pub fn is_full(&self) -> bool {
        self.inner.lock().is_full()
    }

    /// See [`RingBuffer::size`].
    pub fn size(&self) -> usize {
        self.inner.lock().size()
    }

    /// See [`RingBuffer::capacity`].
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    /// See [`RingBuffer::status`].
    pub fn status(&self) -> BufferStatus {
        self.inner.lock().status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::SampleRecord;
    use std::thread;

    fn record(timestamp_ms: u32) -> EncodedRecord {
        SampleRecord {
            timestamp_ms,
            ..Default::default()
        }
        .encode()
    }

    fn timestamps(records: &[EncodedRecord]) -> Vec<u32> {
        records.iter().map(EncodedRecord::timestamp_ms).collect()
    }

    #[test]
    fn test_create_ring_buffer() {
        let rb = RingBuffer::new(120).unwrap();
        assert_eq!(rb.capacity(), 120);
        assert_eq!(rb.size(), 0);
        assert!(!rb.is_full());
        assert!(rb.latest().is_none());
        assert!(rb.snapshot_all().is_empty());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            RingBuffer::new(0),
            Err(TelemetryError::InvalidBufferCapacity)
        ));
    }

    #[test]
    fn test_partial_fill_is_prefix() {
        let mut rb = RingBuffer::new(4).unwrap();
        rb.push(record(10));
        rb.push(record(20));

        assert_eq!(timestamps(&rb.snapshot_all()), vec![10, 20]);
        assert_eq!(rb.latest().map(|r| r.timestamp_ms()), Some(20));
        assert_eq!(rb.size(), 2);
    }

    #[test]
    fn test_circular_wrap() {
        let mut rb = RingBuffer::new(3).unwrap();
        for ts in 1..=4 {
            rb.push(record(ts));
        }

        assert_eq!(timestamps(&rb.snapshot_all()), vec![2, 3, 4]);
        assert_eq!(rb.latest().map(|r| r.timestamp_ms()), Some(4));
        assert!(rb.is_full());
        assert_eq!(rb.size(), 3);
    }

    #[test]
    fn test_latest_wraps_to_last_slot() {
        let mut rb = RingBuffer::new(3).unwrap();
        for ts in 1..=3 {
            rb.push(record(ts));
        }
        // write_index is back at 0, so latest lives in slot capacity - 1
        assert_eq!(rb.latest().map(|r| r.timestamp_ms()), Some(3));
        assert_eq!(timestamps(&rb.snapshot_all()), vec![1, 2, 3]);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut rb = RingBuffer::new(2).unwrap();
        rb.push(record(1));
        rb.push(record(2));
        rb.push(record(3));
        rb.clear();

        assert_eq!(rb.size(), 0);
        assert_eq!(rb.capacity(), 2);
        assert!(rb.latest().is_none());

        rb.push(record(9));
        assert_eq!(timestamps(&rb.snapshot_all()), vec![9]);
    }

    #[test]
    fn test_status_reports_usage() {
        let mut rb = RingBuffer::new(4).unwrap();
        rb.push(record(1));
        let status = rb.status();
        assert_eq!(status.free(), 3);
        assert!((status.usage_percent() - 25.0).abs() < f64::EPSILON);
        assert!(!status.is_full());
    }

    #[test]
    fn test_concurrent_write_read() {
        let rb = SharedRingBuffer::new(16).unwrap();

        let rb_writer = rb.clone();
        let writer = thread::spawn(move || {
            for ts in 0..1000u32 {
                rb_writer.push(record(ts));
            }
        });

        let rb_reader = rb.clone();
        let reader = thread::spawn(move || {
            for _ in 0..200 {
                let snapshot = timestamps(&rb_reader.snapshot_all());
                // Any observed state must be a contiguous, ordered run of pushes
                for pair in snapshot.windows(2) {
                    assert_eq!(pair[1], pair[0] + 1);
                }
                assert!(snapshot.len() <= 16);
            }
        });

        writer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(timestamps(&rb.snapshot_all()), (984..1000).collect::<Vec<_>>());
    }
}
