//! # Serial Frame Reader
//!
//! Pulls bytes from any async source into the frame decoder and logs each
//! decoded sample as one CSV row.

use bytes::{Buf, BytesMut};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use crate::error::{IngestError, Result};
use crate::frame::decoder::{DecoderStats, FrameDecoder};
use crate::frame::protocol::{ChecksumMode, DecodedSample, FrameEvent};
use crate::record::FlatRecord;
use crate::telemetry::session::timestamped_record;
use crate::telemetry::DestinationTable;

/// Bytes requested from the source per read
const READ_CHUNK_SIZE: usize = 256;

/// Frame decoder bound to an async byte source
pub struct FrameReader<R> {
    source: R,
    decoder: FrameDecoder,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(source: R, mode: ChecksumMode) -> Self {
        Self {
            source,
            decoder: FrameDecoder::new(mode),
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// Wait for the next complete frame
    ///
    /// Suspends while the source is idle; there is no read timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportClosed` at end of stream, `Io` on read failure.
    /// Bad frames are returned as `FrameEvent::ChecksumError`, not errors.
    pub async fn next_event(&mut self) -> Result<FrameEvent> {
        loop {
            while self.buffer.has_remaining() {
                let byte = self.buffer.get_u8();
                if let Some(event) = self.decoder.push(byte) {
                    return Ok(event);
                }
            }

            self.buffer.clear();
            self.buffer.reserve(READ_CHUNK_SIZE);
            let read = self.source.read_buf(&mut self.buffer).await?;
            if read == 0 {
                return Err(IngestError::TransportClosed);
            }
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

/// CSV row for one decoded sample: `arrival_time_us, x, y, z`
pub fn sample_record(sample: &DecodedSample) -> FlatRecord {
    let mut record = timestamped_record(sample.arrival);
    record.insert("x", sample.x);
    record.insert("y", sample.y);
    record.insert("z", sample.z);
    record
}

/// Log every decoded sample to `key` until the source closes or `shutdown`
/// resolves
///
/// Checksum errors are skipped. Logger failures end the loop since no
/// later sample could be written either. Returns `Ok` on shutdown; the
/// reader keeps its final counters.
///
/// # Errors
///
/// Returns error if:
/// - The source closes or fails (`TransportClosed`, `Io`)
/// - The destination cannot be written (`DestinationUnavailable`, `LoggerClosed`, `Io`)
pub async fn run_listener<R, F>(
    reader: &mut FrameReader<R>,
    table: &DestinationTable,
    key: &str,
    status_interval: u64,
    shutdown: F,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut last_status = 0u64;

    loop {
        let event = tokio::select! {
            event = reader.next_event() => event?,
            _ = &mut shutdown => return Ok(()),
        };

        match event {
            FrameEvent::Sample(sample) => {
                table.write(key, &sample_record(&sample))?;
            }
            FrameEvent::ChecksumError { .. } => {
                debug!("Skipped corrupt frame");
            }
        }

        let stats = reader.stats();
        let seen = stats.frames + stats.checksum_errors;
        if seen - last_status >= status_interval {
            info!(
                "Frames: {} ok, {} checksum errors, {} bytes skipped",
                stats.frames, stats.checksum_errors, stats.preamble_mismatches
            );
            last_status = seen;
        }
    }
}
