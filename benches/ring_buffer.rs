//! Criterion benchmarks for the telemetry data path.
//!
//! Key metrics:
//! - Push latency into the shared ring buffer (lock included)
//! - Snapshot latency at different fill levels
//! - Framing cost for a full-buffer downlink
//! - Push latency while a reader snapshots concurrently
//!
//! Run with: cargo bench --bench ring_buffer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sci_telemetry::data::{frame, EncodedRecord, SampleRecord, SharedRingBuffer, RECORD_SIZE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn sample(timestamp_ms: u32) -> EncodedRecord {
    SampleRecord {
        timestamp_ms,
        temperatures: [22.0; 4],
        pressures: [101.3; 4],
        board_temperatures: [25.0; 6],
        voltages: [5.0; 6],
        currents: [0.12; 6],
        powers: [0.6; 6],
        die_temperatures: [30.0; 6],
    }
    .encode()
}

/// Push into a full buffer, so every push overwrites the oldest record.
fn ring_buffer_push(c: &mut Criterion) {
    let buffer = SharedRingBuffer::new(120).unwrap();
    for t in 0..120 {
        buffer.push(sample(t));
    }
    let record = sample(1000);

    let mut group = c.benchmark_group("ring_buffer_push");
    group.throughput(Throughput::Bytes(RECORD_SIZE as u64));
    group.bench_function("push_full", |b| {
        b.iter(|| buffer.push(black_box(record)));
    });
    group.finish();
}

/// Snapshot latency at different fill levels.
fn ring_buffer_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer_snapshot");

    for fill in [0usize, 10, 60, 120] {
        let buffer = SharedRingBuffer::new(120).unwrap();
        for t in 0..fill {
            buffer.push(sample(t as u32));
        }

        group.bench_with_input(BenchmarkId::new("snapshot_all", fill), &fill, |b, _| {
            b.iter(|| black_box(buffer.snapshot_all()));
        });
    }

    group.finish();
}

/// Framing a full buffer for the downlink.
fn frame_full_buffer(c: &mut Criterion) {
    let records: Vec<EncodedRecord> = (0..120).map(sample).collect();

    let mut group = c.benchmark_group("framer");
    group.throughput(Throughput::Bytes((records.len() * RECORD_SIZE) as u64));
    group.bench_function("frame_120", |b| {
        b.iter(|| black_box(frame(black_box(&records))));
    });
    group.finish();
}

/// Push latency with a reader snapshotting in a loop on another thread.
fn ring_buffer_contended_push(c: &mut Criterion) {
    let buffer = SharedRingBuffer::new(120).unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let buffer = buffer.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                black_box(buffer.snapshot_all());
            }
        })
    };

    let record = sample(1);
    c.bench_function("ring_buffer_contended_push", |b| {
        b.iter(|| buffer.push(black_box(record)));
    });

    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();
}

criterion_group!(
    benches,
    ring_buffer_push,
    ring_buffer_snapshot,
    frame_full_buffer,
    ring_buffer_contended_push
);
criterion_main!(benches);
