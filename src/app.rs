//! Application assembly.
//!
//! `TelemetryApp` owns one running instance of the telemetry core: the calibration store,
//! the shared ring buffer, the sensor sampler, the downlink transport and the two
//! background tasks. A reboot is a full `shutdown` followed by a fresh `start`, which
//! reloads calibration from disk and begins with an empty buffer.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::calibration::CalibrationStore;
use crate::config::AppConfig;
use crate::data::SharedRingBuffer;
use crate::hardware::{build_transport, Transport};
use crate::sampling::{Sampler, SensorSet};
use crate::shell::ShellContext;
use crate::tasks::{AcquisitionTask, DistributionTask};

/// One running instance of the telemetry core.
pub struct TelemetryApp {
    config: Arc<AppConfig>,
    calibration: Arc<CalibrationStore>,
    buffer: SharedRingBuffer,
    sampler: Sampler,
    transport: Arc<dyn Transport>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    started_at: Instant,
}

impl TelemetryApp {
    /// Start with simulated sensors and the configured transport.
    pub async fn start(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let transport =
            build_transport(&config.distribution.transport).context("Failed to open transport")?;
        Self::start_with(config, SensorSet::simulated(&config.sensors), transport).await
    }

    /// Start with explicit sensor families and transport.
    pub async fn start_with(
        config: &AppConfig,
        sensors: SensorSet,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config.clone());

        for (family, declared, expected) in sensors.layout_mismatches() {
            warn!(family, declared, expected, "Sensor family will read as absent");
        }

        let calibration = Arc::new(CalibrationStore::load(&config.calibration.path));
        let buffer = SharedRingBuffer::new(config.acquisition.buffer_capacity)?;
        let sampler = Sampler::new(sensors, calibration.active(), config.read_timeout());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let acquisition =
            AcquisitionTask::new(sampler.clone(), buffer.clone(), config.sample_period());
        let distribution = DistributionTask::new(
            buffer.clone(),
            Arc::clone(&transport),
            config.poll_interval(),
        );

        let tasks = vec![
            tokio::spawn(acquisition.run(shutdown_rx.clone())),
            tokio::spawn(distribution.run(shutdown_rx)),
        ];

        info!(
            name = %config.application.name,
            capacity = config.acquisition.buffer_capacity,
            interval_ms = config.acquisition.interval_ms,
            transport = %transport.describe(),
            "Telemetry core started"
        );

        Ok(Self {
            config,
            calibration,
            buffer,
            sampler,
            transport,
            shutdown_tx,
            tasks,
            started_at: Instant::now(),
        })
    }

    /// Configuration the app was started with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared ring buffer.
    pub fn buffer(&self) -> &SharedRingBuffer {
        &self.buffer
    }

    /// Calibration store.
    pub fn calibration(&self) -> &Arc<CalibrationStore> {
        &self.calibration
    }

    /// Sensor sampler.
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Downlink transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Receiver that turns true once shutdown begins.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Handles needed by the command shell.
    pub fn shell_context(&self) -> ShellContext {
        ShellContext {
            config: Arc::clone(&self.config),
            buffer: self.buffer.clone(),
            sampler: self.sampler.clone(),
            calibration: Arc::clone(&self.calibration),
            transport: Arc::clone(&self.transport),
            shutdown: self.shutdown_signal(),
            started_at: self.started_at,
        }
    }

    /// Signal both tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        info!("Shutting down telemetry core");
        self.shutdown_tx.send_replace(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Task ended abnormally");
            }
        }
        info!("Telemetry core stopped");
    }
}
