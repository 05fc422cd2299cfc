//! Maintenance command shell.
//!
//! Reads one command per line, dispatches it by `match` on [`Command`] and writes
//! human-readable text back. The shell is generic over its input and output so the same
//! code serves stdin/stdout, one-shot `exec` runs and tests.
//!
//! Streaming modes (`sensors --stream`, `housekeeping --stream`, `stream`) keep emitting
//! until any input line arrives, input ends or the application shuts down. No lock is held
//! while the shell waits on input or output.

pub mod command;
pub mod format;

use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::calibration::{
    CalibrationEdit, CalibrationGroup, CalibrationParams, CalibrationStore, LoadSource,
};
use crate::config::AppConfig;
use crate::data::record::{POWER_CHANNELS, PRESSURE_CHANNELS, THERMOCOUPLE_CHANNELS};
use crate::data::{frame, SharedRingBuffer, RECORD_LAYOUT_VERSION, RECORD_SIZE};
use crate::hardware::{GroupReading, Transport};
use crate::sampling::Sampler;
use crate::error::TelemetryResult;
use crate::selftest;

pub use command::{help_text, Command, CommandError, CommandInfo, COMMANDS};

/// Handles into a running telemetry core.
#[derive(Clone)]
pub struct ShellContext {
    /// Configuration the core was started with
    pub config: Arc<AppConfig>,
    /// Shared ring buffer
    pub buffer: SharedRingBuffer,
    /// Sensor sampler (fresh reads for status and self-test)
    pub sampler: Sampler,
    /// Calibration store
    pub calibration: Arc<CalibrationStore>,
    /// Downlink transport
    pub transport: Arc<dyn Transport>,
    /// Turns true when the core shuts down
    pub shutdown: watch::Receiver<bool>,
    /// When the core started
    pub started_at: Instant,
}

/// Why the shell stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// Input reached end-of-file
    EndOfInput,
    /// `exit` / `quit`
    Exit,
    /// `reboot`: restart the core and come back
    Reboot,
    /// The core shut down underneath the shell
    Shutdown,
}

/// What to do after one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command
    Continue,
    /// Leave the shell
    Stop(ShellExit),
}

enum StreamKind {
    Sensors,
    Housekeeping,
}

enum Reply {
    Keep,
    Abort,
    Value(f32),
}

/// Line-oriented command shell.
pub struct Shell<R, W> {
    lines: Lines<R>,
    output: W,
    ctx: ShellContext,
}

impl<R, W> Shell<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Shell reading commands from `input` and writing to `output`.
    pub fn new(input: R, output: W, ctx: ShellContext) -> Self {
        Self {
            lines: input.lines(),
            output,
            ctx,
        }
    }

    /// Point the shell at a freshly started core (after a reboot).
    pub fn replace_context(&mut self, ctx: ShellContext) {
        self.ctx = ctx;
    }

    /// The output sink.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Read and execute commands until exit, reboot, end of input or shutdown.
    pub async fn run(&mut self) -> io::Result<ShellExit> {
        let banner = format!(
            "{} CLI ready.\nType 'help' for commands.\n",
            self.ctx.config.application.name
        );
        self.say(&banner).await?;

        loop {
            if *self.ctx.shutdown.borrow() {
                return Ok(ShellExit::Shutdown);
            }

            let prompt = self.ctx.config.shell.prompt.clone();
            self.output.write_all(prompt.as_bytes()).await?;
            self.output.flush().await?;

            let mut shutdown = self.ctx.shutdown.clone();
            let line = tokio::select! {
                line = self.lines.next_line() => line?,
                _ = shutdown.changed() => return Ok(ShellExit::Shutdown),
            };

            let Some(line) = line else {
                return Ok(ShellExit::EndOfInput);
            };

            if let Flow::Stop(exit) = self.execute_line(&line).await? {
                return Ok(exit);
            }
        }
    }

    /// Parse and execute one command line.
    pub async fn execute_line(&mut self, line: &str) -> io::Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        match line.parse::<Command>() {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                self.say(&format!("Error: {}", e)).await?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Execute a parsed command.
    pub async fn execute(&mut self, command: Command) -> io::Result<Flow> {
        match command {
            Command::Help => self.say(&help_text()).await?,
            Command::Status => self.status().await?,
            Command::Sensors { stream: false } => self.sensors(StreamKind::Sensors).await?,
            Command::Sensors { stream: true } => self.stream_text(StreamKind::Sensors).await?,
            Command::Housekeeping { stream: false } => {
                self.sensors(StreamKind::Housekeeping).await?
            }
            Command::Housekeeping { stream: true } => {
                self.stream_text(StreamKind::Housekeeping).await?
            }
            Command::BufferStatus => self.buffer_status().await?,
            Command::Dump => self.dump().await?,
            Command::Erase => {
                self.ctx.buffer.clear();
                info!("Buffer erased from shell");
                self.say("BUFFER ERASED").await?;
            }
            Command::CalibrationShow => self.calibration_show().await?,
            Command::CalibrationStart => self.calibration_start().await?,
            Command::CalibrationSet {
                group,
                channel,
                value,
            } => self.calibration_set(group, channel, value).await?,
            Command::CalibrationReset => self.calibration_reset().await?,
            Command::SelfTest => self.self_test().await?,
            Command::Stream => self.stream_binary().await?,
            Command::Version => self.version().await?,
            Command::Reboot => {
                self.say("Rebooting...").await?;
                return Ok(Flow::Stop(ShellExit::Reboot));
            }
            Command::Exit => return Ok(Flow::Stop(ShellExit::Exit)),
        }
        Ok(Flow::Continue)
    }

    async fn say(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        if !text.ends_with('\n') {
            self.output.write_all(b"\n").await?;
        }
        self.output.flush().await
    }

    async fn status(&mut self) -> io::Result<()> {
        let buffer = self.ctx.buffer.status();
        let readings = self.ctx.sampler.sample().await;
        let absent = readings.absent_groups();

        let mut out = String::from("\n=== SYSTEM STATUS ===\n\n");
        out.push_str(&format!(
            "Uptime:\t\t{}\n",
            format::format_uptime(self.ctx.started_at.elapsed())
        ));
        out.push_str(&format!(
            "Buffer:\t\t{}/{} samples ({:.1}%)\n",
            buffer.size,
            buffer.capacity,
            buffer.usage_percent()
        ));
        out.push_str(&format!("Transport:\t{}\n", self.ctx.transport.describe()));
        out.push_str(&format!(
            "Sensors:\t{}\n",
            if absent.is_empty() {
                "all present".to_string()
            } else {
                format!("ABSENT: {}", absent.join(", "))
            }
        ));
        if self.ctx.calibration.restart_required() {
            out.push_str("Calibration:\tedited, restart required\n");
        }

        out.push_str("\nScience Sensors (Latest):\n");
        out.push_str(&format::format_science(&readings));

        let power = &readings.power_monitors;
        out.push_str("\nHousekeeping (Latest):\n");
        if power.present {
            let voltages = &power.values[..POWER_CHANNELS];
            let powers = &power.values[2 * POWER_CHANNELS..3 * POWER_CHANNELS];
            let avg_voltage = voltages.iter().sum::<f32>() / voltages.len() as f32;
            let total_power: f32 = powers.iter().sum();
            out.push_str(&format!("Avg Voltage:\t{:.2}V\n", avg_voltage));
            out.push_str(&format!("Total Power:\t{:.2}W\n", total_power));
        } else {
            out.push_str("Power monitors:\tABSENT\n");
        }
        out.push_str("\n=== END STATUS ===\n");
        self.say(&out).await
    }

    async fn sensors(&mut self, kind: StreamKind) -> io::Result<()> {
        let readings = self.ctx.sampler.sample().await;
        let (title, body) = match kind {
            StreamKind::Sensors => ("SENSORS", format::format_science(&readings)),
            StreamKind::Housekeeping => ("HOUSEKEEPING", format::format_housekeeping(&readings)),
        };
        self.say(&format!("\n=== {} ===\n\n{}\n=== END ===\n", title, body))
            .await
    }

    async fn stream_text(&mut self, kind: StreamKind) -> io::Result<()> {
        self.say("Streaming; press Enter to stop.").await?;
        let interval = self.ctx.config.stream_interval();
        let mut shutdown = self.ctx.shutdown.clone();

        loop {
            let readings = self.ctx.sampler.sample().await;
            let body = match kind {
                StreamKind::Sensors => format::format_science(&readings),
                StreamKind::Housekeeping => format::format_housekeeping(&readings),
            };
            self.say(&body).await?;

            tokio::select! {
                _ = sleep(interval) => {}
                _ = self.lines.next_line() => break,
                _ = shutdown.changed() => break,
            }
        }

        self.say("Stream stopped.").await
    }

    async fn stream_binary(&mut self) -> io::Result<()> {
        let interval = self.ctx.config.stream_interval();
        let mut shutdown = self.ctx.shutdown.clone();
        let mut last_sent = None;

        loop {
            if let Some(record) = self.ctx.buffer.latest() {
                if last_sent != Some(record) {
                    if let Some(block) = frame(&[record]) {
                        self.output.write_all(&block).await?;
                        self.output.flush().await?;
                    }
                    last_sent = Some(record);
                }
            }

            tokio::select! {
                _ = sleep(interval) => {}
                _ = self.lines.next_line() => break,
                _ = shutdown.changed() => break,
            }
        }
        Ok(())
    }

    async fn buffer_status(&mut self) -> io::Result<()> {
        let status = self.ctx.buffer.status();
        let text = format!(
            "\n=== BUFFER STATUS ===\n\
             Capacity:\t{} samples\n\
             Used:\t\t{} samples\n\
             Free:\t\t{} samples\n\
             Usage:\t\t{:.1}%\n\
             Status:\t\t{}\n\
             === END ===\n",
            status.capacity,
            status.size,
            status.free(),
            status.usage_percent(),
            if status.is_full() { "FULL" } else { "OK" }
        );
        self.say(&text).await
    }

    async fn dump(&mut self) -> io::Result<()> {
        let records = self.ctx.buffer.snapshot_all();
        if records.is_empty() {
            return self.say("Buffer is empty.").await;
        }

        self.say(&format!("\n=== DATA DUMP ({} samples) ===\n", records.len()))
            .await?;
        for (index, encoded) in records.iter().enumerate() {
            let text = format::format_record(index, &encoded.decode());
            self.say(&text).await?;
        }
        self.say("=== END DUMP ===").await
    }

    async fn calibration_show(&mut self) -> io::Result<()> {
        let active = self.ctx.calibration.active();
        let current = self.ctx.calibration.snapshot();

        let mut out = format!(
            "\n=== CALIBRATION ({}) ===\n",
            self.ctx.calibration.path().display()
        );
        match self.ctx.calibration.source() {
            LoadSource::File => out.push_str("Loaded from:\tfile\n"),
            LoadSource::Defaults { reason } => {
                out.push_str(&format!("Loaded from:\tdefaults ({})\n", reason))
            }
        }
        out.push_str(&render_params(&current));
        if *active != current {
            out.push_str("\nIn use until restart:\n");
            out.push_str(&render_params(&active));
            out.push_str("Restart required: run 'reboot' to apply.\n");
        }
        out.push_str("=== END ===\n");
        self.say(&out).await
    }

    async fn calibration_set(
        &mut self,
        group: CalibrationGroup,
        channel: usize,
        value: f32,
    ) -> io::Result<()> {
        let result = self
            .persist_calibration(move |store| store.update(group, channel, value))
            .await?;
        match result {
            Ok(params) => {
                let applied = params.group(group)[channel];
                self.say(&format!("{}[{}] = {:.6}", group, channel, applied))
                    .await?;
                self.say("Saved. Restart required: run 'reboot' to apply.")
                    .await
            }
            Err(e) => {
                warn!(error = %e, "Calibration update rejected");
                self.say(&format!("Error: {}", e)).await
            }
        }
    }

    async fn calibration_reset(&mut self) -> io::Result<()> {
        let result = self
            .persist_calibration(CalibrationStore::reset_to_defaults)
            .await?;
        match result {
            Ok(params) => {
                self.say("Calibration reset to defaults:").await?;
                self.say(&render_params(&params)).await?;
                self.say("Restart required: run 'reboot' to apply.").await
            }
            Err(e) => {
                warn!(error = %e, "Calibration reset failed");
                self.say(&format!("Error: {}", e)).await
            }
        }
    }

    async fn calibration_start(&mut self) -> io::Result<()> {
        self.say(
            "Calibration walkthrough. Enter a new value, blank or 's' to keep, 'q' to abort.",
        )
        .await?;

        let current = self.ctx.calibration.snapshot();
        let raw = self.ctx.sampler.read_raw().await;
        let mut edits = Vec::new();

        for channel in 0..THERMOCOUPLE_CHANNELS {
            let prompt = format!(
                "TC{} raw {:.2}C, temp-offset {:.3}: ",
                channel,
                raw_value(&raw.thermocouples, channel),
                current.temperature_offsets[channel]
            );
            match self.ask(&prompt).await? {
                Reply::Keep => {}
                Reply::Abort => return self.say("Calibration aborted; nothing changed.").await,
                Reply::Value(value) => edits.push(CalibrationEdit::new(
                    CalibrationGroup::TemperatureOffset,
                    channel,
                    value,
                )),
            }
        }

        for channel in 0..PRESSURE_CHANNELS {
            let raw_volts = raw_value(&raw.pressure, channel);
            for group in [CalibrationGroup::PressureSlope, CalibrationGroup::PressureOffset] {
                let prompt = format!(
                    "P{} raw {:.6}V, {} {:.6}: ",
                    channel,
                    raw_volts,
                    group,
                    current.group(group)[channel]
                );
                match self.ask(&prompt).await? {
                    Reply::Keep => {}
                    Reply::Abort => {
                        return self.say("Calibration aborted; nothing changed.").await
                    }
                    Reply::Value(value) => {
                        edits.push(CalibrationEdit::new(group, channel, value))
                    }
                }
            }
        }

        if edits.is_empty() {
            return self.say("No changes.").await;
        }

        let staged = edits.clone();
        let result = self
            .persist_calibration(move |store| store.update_batch(&staged))
            .await?;
        match result {
            Ok(_) => {
                for edit in &edits {
                    self.say(&format!(
                        "{}[{}] = {:.6}",
                        edit.group, edit.channel, edit.value
                    ))
                    .await?;
                }
                self.say("Saved. Restart required: run 'reboot' to apply.")
                    .await
            }
            Err(e) => {
                warn!(error = %e, "Calibration walkthrough not saved");
                self.say(&format!("Error: {}", e)).await
            }
        }
    }

    /// Run a calibration rewrite on the blocking pool; the store fsyncs under its lock.
    async fn persist_calibration<T, F>(&self, write: F) -> io::Result<TelemetryResult<T>>
    where
        F: FnOnce(&CalibrationStore) -> TelemetryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.ctx.calibration);
        tokio::task::spawn_blocking(move || write(store.as_ref()))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    /// Prompt until the operator gives a usable answer. End of input aborts.
    async fn ask(&mut self, prompt: &str) -> io::Result<Reply> {
        loop {
            self.output.write_all(prompt.as_bytes()).await?;
            self.output.flush().await?;

            let Some(line) = self.lines.next_line().await? else {
                return Ok(Reply::Abort);
            };
            match line.trim() {
                "" | "s" | "skip" => return Ok(Reply::Keep),
                "q" | "abort" => return Ok(Reply::Abort),
                text => match text.parse::<f32>() {
                    Ok(value) if value.is_finite() => return Ok(Reply::Value(value)),
                    _ => self.say(&format!("Not a number: '{}'", text)).await?,
                },
            }
        }
    }

    async fn self_test(&mut self) -> io::Result<()> {
        let readings = self.ctx.sampler.sample().await;
        let report = selftest::evaluate(&readings, self.ctx.buffer.status());
        if report.all_passed() {
            info!(passed = report.passed_count(), "Self-test passed");
        } else {
            warn!(
                passed = report.passed_count(),
                failed = report.failed_count(),
                "Self-test found failures"
            );
        }
        self.say(&format!("\n=== SELF-TEST ===\n{}\n=== END ===\n", report))
            .await
    }

    async fn version(&mut self) -> io::Result<()> {
        let text = format!(
            "\n=== FIRMWARE INFORMATION ===\n\
             Board:\t\t{}\n\
             Firmware:\tv{}\n\
             Record layout:\tv{} ({} bytes)\n",
            self.ctx.config.application.name,
            env!("CARGO_PKG_VERSION"),
            RECORD_LAYOUT_VERSION,
            RECORD_SIZE
        );
        self.say(&text).await
    }
}

fn raw_value(reading: &GroupReading, channel: usize) -> f32 {
    if reading.present {
        reading.values.get(channel).copied().unwrap_or(0.0)
    } else {
        0.0
    }
}

fn render_params(params: &CalibrationParams) -> String {
    CalibrationGroup::ALL
        .iter()
        .map(|group| {
            format!(
                "{:<16} {}\n",
                group.as_str(),
                format::format_values(params.group(*group), 6, "")
            )
        })
        .collect()
}
