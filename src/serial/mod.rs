//! # Serial Communication Module
//!
//! Handles the serial side of the pipeline.
//!
//! This module handles:
//! - Opening a serial device 8N1 at the configured baud rate
//! - Reading frames from the byte stream and logging samples
//! - Writing sample frames for bench testing

pub mod reader;
pub mod talker;

use crate::error::{IngestError, Result};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

/// Opened serial device
pub struct SerialLink {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SerialLink {
    /// Open a serial device
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0" or "COM3")
    /// * `baud_rate` - Line speed
    ///
    /// # Errors
    ///
    /// Returns `Serial` error if the device cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telemetry_ingest::serial::SerialLink;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let link = SerialLink::open("/dev/ttyUSB0", 115200)?;
    ///     println!("Connected to: {}", link.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        debug!("Trying to open serial port: {}", path);

        let port = Self::open_port(path, baud_rate)?;
        info!("Opened serial device at {} ({} baud)", path, baud_rate);

        Ok(Self {
            port,
            device_path: path.to_string(),
        })
    }

    /// Open a specific serial port with 8N1 settings and no flow control
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| IngestError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Path of the opened device
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Give up the wrapper and return the async stream
    pub fn into_stream(self) -> tokio_serial::SerialStream {
        self.port
    }
}
