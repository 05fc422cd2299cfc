//! Downlink transports.
//!
//! - `FileTransport` appends every frame to a capture file (bench and ground testing)
//! - `SerialTransport` writes frames to a serial device such as an RS-485 adapter
//!   (requires the `serial` feature)
//!
//! `build_transport` picks the implementation named in the configuration.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::config::{TransportConfig, TransportKind};
use crate::hardware::capabilities::Transport;
use crate::hardware::mock::MockTransport;

/// Appends every transmitted block to a file.
pub struct FileTransport {
    path: PathBuf,
}

impl FileTransport {
    /// Transport writing to `path`; the file is created on first transmit.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Capture file location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for FileTransport {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn transmit(&self, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open downlink capture {:?}", self.path))?;
        file.write_all(bytes)
            .await
            .context("Failed to append downlink frame")?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(feature = "serial")]
pub use serial::SerialTransport;

#[cfg(feature = "serial")]
mod serial {
    use super::*;
    use anyhow::anyhow;
    use parking_lot::Mutex;
    use serialport::SerialPort;
    use std::io::{Read, Write};
    use std::time::Duration;

    /// Serial-port downlink (RS-485 adapter, USB CDC, ...).
    pub struct SerialTransport {
        device: String,
        port: Arc<Mutex<Box<dyn SerialPort>>>,
    }

    impl SerialTransport {
        /// Open `device` at `baud_rate` with a per-write `timeout`.
        pub fn open(device: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
            let port = serialport::new(device, baud_rate)
                .timeout(timeout)
                .open()
                .with_context(|| format!("Failed to open serial port {}", device))?;
            Ok(Self {
                device: device.to_string(),
                port: Arc::new(Mutex::new(port)),
            })
        }
    }

    #[async_trait]
    impl Transport for SerialTransport {
        fn describe(&self) -> String {
            format!("serial:{}", self.device)
        }

        async fn transmit(&self, bytes: &[u8]) -> Result<()> {
            let port = Arc::clone(&self.port);
            let block = bytes.to_vec();
            tokio::task::spawn_blocking(move || -> Result<()> {
                let mut port = port.lock();
                port.write_all(&block)?;
                port.flush()?;
                Ok(())
            })
            .await
            .map_err(|e| anyhow!("serial write task failed: {}", e))?
        }

        async fn receive(&self) -> Result<Option<Vec<u8>>> {
            let port = Arc::clone(&self.port);
            tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>> {
                let mut port = port.lock();
                let pending = port.bytes_to_read()? as usize;
                if pending == 0 {
                    return Ok(None);
                }
                let mut buf = vec![0u8; pending];
                let read = port.read(&mut buf)?;
                buf.truncate(read);
                Ok(Some(buf))
            })
            .await
            .map_err(|e| anyhow!("serial read task failed: {}", e))?
        }
    }
}

/// Build the transport named in `config`.
pub fn build_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    match config.kind {
        TransportKind::Mock => Ok(Arc::new(MockTransport::new())),
        TransportKind::File => {
            let path = config
                .path
                .clone()
                .context("file transport requires distribution.transport.path")?;
            Ok(Arc::new(FileTransport::new(path)))
        }
        #[cfg(feature = "serial")]
        TransportKind::Serial => {
            let path = config
                .path
                .as_ref()
                .context("serial transport requires distribution.transport.path")?;
            Ok(Arc::new(SerialTransport::open(
                &path.to_string_lossy(),
                config.baud_rate,
                std::time::Duration::from_millis(config.timeout_ms),
            )?))
        }
        #[cfg(not(feature = "serial"))]
        TransportKind::Serial => {
            anyhow::bail!("Serial transport is not enabled. Rebuild with --features serial")
        }
    }
}
