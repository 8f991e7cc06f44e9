//! # Serial Sample Talker
//!
//! Writes synthetic position frames, for exercising a listener on the other
//! end of a serial link (or a loopback cable).

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::frame::encoder::encode_sample_frame;
use crate::frame::protocol::ChecksumMode;

/// Position for the `index`-th frame: radius-100 circle, z counts 0..100
pub fn sample_at(index: u64) -> (f32, f32, f32) {
    let angle = (index % 360) as f32 * std::f32::consts::PI / 180.0;
    (100.0 * angle.cos(), 100.0 * angle.sin(), (index % 100) as f32)
}

/// Frame writer producing a slow circular trajectory
pub struct SampleTalker<W> {
    sink: W,
    mode: ChecksumMode,
    sent: u64,
}

impl<W: AsyncWrite + Unpin> SampleTalker<W> {
    pub fn new(sink: W, mode: ChecksumMode) -> Self {
        Self { sink, mode, sent: 0 }
    }

    /// Encode and write the next frame, returning the sample sent
    ///
    /// # Errors
    ///
    /// Returns `Serial` error if the write or flush fails
    pub async fn send_next(&mut self) -> Result<(f32, f32, f32)> {
        let (x, y, z) = sample_at(self.sent);
        let frame = encode_sample_frame(x, y, z, self.mode);

        self.sink
            .write_all(&frame)
            .await
            .map_err(|e| IngestError::Serial(format!("Failed to write frame: {}", e)))?;
        self.sink
            .flush()
            .await
            .map_err(|e| IngestError::Serial(format!("Failed to flush serial port: {}", e)))?;

        self.sent += 1;
        debug!("Sent frame {}: {}, {}, {}", self.sent, x, y, z);
        Ok((x, y, z))
    }

    /// Frames written so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_sample_at_start() {
        assert_eq!(sample_at(0), (100.0, 0.0, 0.0));
    }

    #[test]
    fn test_sample_at_wraps() {
        // 1800 is the first index where both the angle and z repeat
        assert_eq!(sample_at(5), sample_at(1805));
    }

    #[tokio::test]
    async fn test_send_next_writes_encoded_frame() {
        let (x, y, z) = sample_at(0);
        let expected = encode_sample_frame(x, y, z, ChecksumMode::ExcludePreamble);
        let sink = Builder::new().write(&expected).build();

        let mut talker = SampleTalker::new(sink, ChecksumMode::ExcludePreamble);
        assert_eq!(talker.send_next().await.unwrap(), (x, y, z));
        assert_eq!(talker.sent(), 1);
    }

    #[tokio::test]
    async fn test_send_next_reports_write_failure() {
        let sink = Builder::new()
            .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"))
            .build();

        let mut talker = SampleTalker::new(sink, ChecksumMode::IncludePreamble);
        match talker.send_next().await {
            Err(IngestError::Serial(msg)) => assert!(msg.contains("Failed to write frame")),
            other => panic!("Expected Serial error, got: {:?}", other),
        }
        assert_eq!(talker.sent(), 0);
    }
}
