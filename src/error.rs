//! # Error Types
//!
//! Custom error types for Telemetry Ingest using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Telemetry Ingest
#[derive(Debug, Error)]
pub enum IngestError {
    /// Byte did not match the expected preamble byte (resynchronization trigger)
    #[error("Preamble mismatch: got 0x{0:02X}")]
    PreambleMismatch(u8),

    /// Trailing checksum byte did not match the XOR of the covered span
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    Checksum { expected: u8, received: u8 },

    /// Datagram was not valid UTF-8 JSON
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Output file for a destination could not be opened or created
    #[error("Destination unavailable: {}: {source}", path.display())]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decode attempted past the end of a buffer
    #[error("Out of range: offset {offset} + 4 exceeds buffer length {len}")]
    OutOfRange { offset: usize, len: usize },

    /// Logger no longer accepts writes
    #[error("Logger is closed")]
    LoggerClosed,

    /// Byte or datagram source reached end of stream
    #[error("Transport closed")]
    TransportClosed,

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Telemetry Ingest
pub type Result<T> = std::result::Result<T, IngestError>;
