//! Ring buffer and record codec properties
//!
//! Exhaustive small-capacity checks of the overwrite-oldest policy, the codec's length
//! contract and the atomicity of snapshots under a concurrent writer.

use sci_telemetry::data::{
    EncodedRecord, RingBuffer, SampleRecord, SharedRingBuffer, RECORD_SIZE,
};
use sci_telemetry::TelemetryError;
use std::thread;

fn record(timestamp_ms: u32) -> EncodedRecord {
    SampleRecord {
        timestamp_ms,
        pressures: [timestamp_ms as f32; 4],
        ..Default::default()
    }
    .encode()
}

fn stamps(records: &[EncodedRecord]) -> Vec<u32> {
    records.iter().map(EncodedRecord::timestamp_ms).collect()
}

#[test]
fn test_size_and_fullness_track_pushes() {
    for capacity in 1..=8usize {
        let mut buffer = RingBuffer::new(capacity).unwrap();
        for pushes in 1..=3 * capacity {
            buffer.push(record(pushes as u32));
            assert_eq!(buffer.size(), pushes.min(capacity));
            assert_eq!(buffer.is_full(), pushes >= capacity);
            assert_eq!(buffer.capacity(), capacity);
        }
    }
}

#[test]
fn test_snapshot_keeps_last_n_in_order() {
    for capacity in 1..=8usize {
        for extra in 1..=2 * capacity {
            let mut buffer = RingBuffer::new(capacity).unwrap();
            let total = capacity + extra;
            for t in 1..=total {
                buffer.push(record(t as u32));
            }

            let expected: Vec<u32> = ((total - capacity + 1)..=total).map(|t| t as u32).collect();
            assert_eq!(stamps(&buffer.snapshot_all()), expected);
            assert_eq!(buffer.latest(), Some(record(total as u32)));
        }
    }
}

#[test]
fn test_partial_fill_snapshot() {
    let mut buffer = RingBuffer::new(5).unwrap();
    assert!(buffer.snapshot_all().is_empty());
    assert_eq!(buffer.latest(), None);

    buffer.push(record(10));
    buffer.push(record(11));
    assert_eq!(stamps(&buffer.snapshot_all()), vec![10, 11]);
}

#[test]
fn test_capacity_three_scenario() {
    let buffer = SharedRingBuffer::new(3).unwrap();
    for t in 1..=4 {
        buffer.push(record(t));
    }
    assert_eq!(stamps(&buffer.snapshot_all()), vec![2, 3, 4]);
    assert_eq!(buffer.latest().map(|r| r.timestamp_ms()), Some(4));
}

#[test]
fn test_clear_then_reuse() {
    let buffer = SharedRingBuffer::new(3).unwrap();
    for t in 1..=5 {
        buffer.push(record(t));
    }
    buffer.clear();
    assert_eq!(buffer.size(), 0);
    assert_eq!(buffer.capacity(), 3);
    assert!(buffer.latest().is_none());

    buffer.push(record(6));
    assert_eq!(stamps(&buffer.snapshot_all()), vec![6]);
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(matches!(
        RingBuffer::new(0),
        Err(TelemetryError::InvalidBufferCapacity)
    ));
}

#[test]
fn test_decode_rejects_every_wrong_length() {
    let bytes = vec![0u8; RECORD_SIZE + 8];
    for len in 0..bytes.len() {
        let result = SampleRecord::decode(&bytes[..len]);
        if len == RECORD_SIZE {
            assert!(result.is_ok());
        } else {
            let rejected = matches!(
                result,
                Err(TelemetryError::MalformedRecord { actual, .. }) if actual == len
            );
            assert!(rejected, "length {} should be rejected", len);
        }
    }
}

#[test]
fn test_special_float_values_survive_encoding() {
    let original = SampleRecord {
        timestamp_ms: u32::MAX,
        temperatures: [f32::NAN, f32::INFINITY, -0.0, f32::MIN_POSITIVE],
        ..Default::default()
    };
    let decoded = original.encode().decode();
    for (a, b) in original.temperatures.iter().zip(decoded.temperatures.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    assert_eq!(decoded.timestamp_ms, u32::MAX);
}

#[test]
fn test_snapshots_are_atomic_under_concurrent_writer() {
    let buffer = SharedRingBuffer::new(16).unwrap();

    let writer = {
        let buffer = buffer.clone();
        thread::spawn(move || {
            for t in 1..=20_000u32 {
                buffer.push(record(t));
            }
        })
    };

    let reader = {
        let buffer = buffer.clone();
        thread::spawn(move || {
            for _ in 0..2_000 {
                let snapshot = stamps(&buffer.snapshot_all());
                // A consistent snapshot is always a run of consecutive timestamps
                for pair in snapshot.windows(2) {
                    assert_eq!(pair[1], pair[0] + 1, "torn snapshot: {:?}", snapshot);
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(buffer.latest().map(|r| r.timestamp_ms()), Some(20_000));
}
