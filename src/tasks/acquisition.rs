//! Acquisition task.
//!
//! One cycle walks `Sampling -> Calibrating -> Encoding -> Publishing` and pushes exactly
//! one record into the ring buffer. Cycles run at a fixed rate: the task measures how long
//! the cycle took and sleeps only for the remainder of the period. An overrun starts the
//! next cycle immediately.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};

use crate::data::{EncodedRecord, SharedRingBuffer};
use crate::error::TelemetryError;
use crate::sampling::{RawReadings, Readings, Sampler};

/// Stage of the acquisition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Reading the sensor families
    Sampling,
    /// Applying calibration
    Calibrating,
    /// Packing the record
    Encoding,
    /// Pushing into the ring buffer
    Publishing,
}

/// Time left in the current period; zero on overrun.
pub fn remaining_period(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Periodic sensor acquisition; the only writer of the ring buffer.
pub struct AcquisitionTask {
    sampler: Sampler,
    buffer: SharedRingBuffer,
    period: Duration,
    state: AcquisitionState,
    absent: Vec<&'static str>,
    cycles: u64,
}

impl AcquisitionTask {
    /// Task sampling with `sampler` into `buffer` every `period`.
    pub fn new(sampler: Sampler, buffer: SharedRingBuffer, period: Duration) -> Self {
        Self {
            sampler,
            buffer,
            period,
            state: AcquisitionState::Sampling,
            absent: Vec::new(),
            cycles: 0,
        }
    }

    /// Current stage.
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one full cycle and return the published record.
    pub async fn run_cycle(&mut self) -> EncodedRecord {
        self.enter(AcquisitionState::Sampling);
        let raw: RawReadings = self.sampler.read_raw().await;

        self.enter(AcquisitionState::Calibrating);
        let readings: Readings = self.sampler.calibrate(raw);
        self.track_absence(&readings);

        self.enter(AcquisitionState::Encoding);
        let record = readings.to_record().encode();

        self.enter(AcquisitionState::Publishing);
        self.buffer.push(record);

        self.cycles += 1;
        self.enter(AcquisitionState::Sampling);
        record
    }

    /// Cycle until `shutdown` turns true or its sender goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(period = ?self.period, "Acquisition task started");

        while !*shutdown.borrow() {
            let started = Instant::now();
            let record = self.run_cycle().await;
            debug!(
                timestamp_ms = record.timestamp_ms(),
                buffered = self.buffer.size(),
                "Sample published"
            );

            let elapsed = started.elapsed();
            if elapsed > self.period {
                warn!(?elapsed, period = ?self.period, "Acquisition cycle overran its period");
            }

            tokio::select! {
                _ = sleep(remaining_period(self.period, elapsed)) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(cycles = self.cycles, "Acquisition task stopped");
    }

    fn enter(&mut self, state: AcquisitionState) {
        trace!(from = ?self.state, to = ?state, "Acquisition state");
        self.state = state;
    }

    fn track_absence(&mut self, readings: &Readings) {
        let absent = readings.absent_groups();
        for group in &absent {
            if !self.absent.contains(group) {
                let error = TelemetryError::SensorAbsent(group.to_string());
                warn!(%error, "Substituting sentinel values");
            }
        }
        for group in &self.absent {
            if !absent.contains(group) {
                info!(group, "Sensor group recovered");
            }
        }
        self.absent = absent;
    }
}
