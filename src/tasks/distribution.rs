//! Distribution task.
//!
//! Every poll interval: snapshot the ring buffer, frame the snapshot with its CRC-16 and
//! hand it to the transport, then drain any inbound bytes. The buffer lock is released
//! before framing; no I/O ever happens under it. Transport errors are logged and the loop
//! carries on.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::data::{frame, SharedRingBuffer};
use crate::hardware::Transport;

/// What one distribution cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DistributionOutcome {
    /// Records in the transmitted frame (0 when the buffer was empty)
    pub records: usize,
    /// Bytes handed to the transport
    pub bytes: usize,
    /// Inbound bytes received
    pub received: usize,
}

/// Periodic downlink of the buffer contents.
pub struct DistributionTask {
    buffer: SharedRingBuffer,
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
    frames_sent: u64,
}

impl DistributionTask {
    /// Task sending `buffer` snapshots over `transport` every `poll_interval`.
    pub fn new(
        buffer: SharedRingBuffer,
        transport: Arc<dyn Transport>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            buffer,
            transport,
            poll_interval,
            frames_sent: 0,
        }
    }

    /// Frames transmitted so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Send one snapshot and poll for inbound data.
    pub async fn run_cycle(&mut self) -> Result<DistributionOutcome> {
        let mut outcome = DistributionOutcome::default();

        let records = self.buffer.snapshot_all();
        if let Some(block) = frame(&records) {
            self.transport.transmit(&block).await?;
            self.frames_sent += 1;
            outcome.records = records.len();
            outcome.bytes = block.len();
        }

        if let Some(inbound) = self.transport.receive().await? {
            debug!(bytes = inbound.len(), "Inbound transport data");
            outcome.received = inbound.len();
        }

        Ok(outcome)
    }

    /// Poll until `shutdown` turns true or its sender goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            transport = %self.transport.describe(),
            interval = ?self.poll_interval,
            "Distribution task started"
        );

        while !*shutdown.borrow() {
            match self.run_cycle().await {
                Ok(outcome) if outcome.records > 0 => {
                    debug!(records = outcome.records, bytes = outcome.bytes, "Frame sent")
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Distribution cycle failed"),
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(frames = self.frames_sent, "Distribution task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{unframe, SampleRecord};
    use crate::hardware::MockTransport;

    fn record(timestamp_ms: u32) -> crate::data::EncodedRecord {
        SampleRecord {
            timestamp_ms,
            ..Default::default()
        }
        .encode()
    }

    #[tokio::test]
    async fn empty_buffer_sends_nothing() {
        let transport = Arc::new(MockTransport::new());
        let buffer = SharedRingBuffer::new(3).unwrap();
        let mut task = DistributionTask::new(buffer, transport.clone(), Duration::from_secs(1));

        let outcome = task.run_cycle().await.unwrap();
        assert_eq!(outcome, DistributionOutcome::default());
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn sends_framed_snapshot() {
        let transport = Arc::new(MockTransport::new());
        let buffer = SharedRingBuffer::new(3).unwrap();
        for t in 1..=4 {
            buffer.push(record(t));
        }
        transport.queue_inbound(vec![0xAA, 0x55]);
        let mut task =
            DistributionTask::new(buffer.clone(), transport.clone(), Duration::from_secs(1));

        let outcome = task.run_cycle().await.unwrap();
        assert_eq!(outcome.records, 3);
        assert_eq!(outcome.received, 2);

        let sent = transport.sent();
        let records = unframe(&sent[0]).unwrap();
        let stamps: Vec<u32> = records.iter().map(|r| r.timestamp_ms()).collect();
        assert_eq!(stamps, vec![2, 3, 4]);
        // Distribution never consumes records
        assert_eq!(buffer.size(), 3);
    }

    #[tokio::test]
    async fn transport_failure_is_reported() {
        let transport = Arc::new(MockTransport::new());
        transport.set_fail_transmit(true);
        let buffer = SharedRingBuffer::new(3).unwrap();
        buffer.push(record(1));
        let mut task = DistributionTask::new(buffer, transport, Duration::from_secs(1));

        assert!(task.run_cycle().await.is_err());
        assert_eq!(task.frames_sent(), 0);
    }
}
