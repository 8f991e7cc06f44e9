//! # Frame Protocol Constants and Types
//!
//! Wire layout: `[0x59][0x35][f32 x][f32 y][f32 z][u8 checksum]`, little endian.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// First preamble byte
pub const PREAMBLE_BYTE_0: u8 = 0x59;

/// Second preamble byte
pub const PREAMBLE_BYTE_1: u8 = 0x35;

/// Full preamble
pub const PREAMBLE: [u8; PREAMBLE_SIZE] = [PREAMBLE_BYTE_0, PREAMBLE_BYTE_1];

/// Preamble length in bytes
pub const PREAMBLE_SIZE: usize = 2;

/// Number of f32 fields carried by a frame (x, y, z)
pub const FRAME_FIELD_COUNT: usize = 3;

/// Size of one encoded f32 field
pub const FIELD_SIZE: usize = 4;

/// Float bytes between preamble and checksum (3 × 4 = 12)
pub const FIELDS_SIZE: usize = FRAME_FIELD_COUNT * FIELD_SIZE;

/// Frame length with trailing checksum (2 + 12 + 1)
pub const FRAME_SIZE_WITH_CHECKSUM: usize = PREAMBLE_SIZE + FIELDS_SIZE + 1;

/// Frame length without trailing checksum (2 + 12)
pub const FRAME_SIZE_WITHOUT_CHECKSUM: usize = PREAMBLE_SIZE + FIELDS_SIZE;

/// Which bytes the trailing XOR checksum covers
///
/// Both spans are seen in deployed senders, so the receiver must be told
/// which one to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumMode {
    /// Checksum covers bytes 0..14 (preamble and floats)
    IncludePreamble,
    /// Checksum covers bytes 2..14 (floats only)
    ExcludePreamble,
    /// No trailing checksum byte; frames are 14 bytes
    Disabled,
}

impl Default for ChecksumMode {
    fn default() -> Self {
        ChecksumMode::IncludePreamble
    }
}

impl ChecksumMode {
    /// Total frame length on the wire for this mode
    pub fn frame_size(self) -> usize {
        match self {
            ChecksumMode::Disabled => FRAME_SIZE_WITHOUT_CHECKSUM,
            _ => FRAME_SIZE_WITH_CHECKSUM,
        }
    }

    /// Bytes to read after the preamble has been matched
    pub fn payload_size(self) -> usize {
        self.frame_size() - PREAMBLE_SIZE
    }

    /// Slice of a complete frame covered by the checksum
    ///
    /// `frame` must include the trailing checksum byte. Returns `None` when
    /// checksumming is disabled.
    pub fn checksum_span(self, frame: &[u8]) -> Option<&[u8]> {
        let end = PREAMBLE_SIZE + FIELDS_SIZE;
        match self {
            ChecksumMode::IncludePreamble => frame.get(..end),
            ChecksumMode::ExcludePreamble => frame.get(PREAMBLE_SIZE..end),
            ChecksumMode::Disabled => None,
        }
    }
}

/// One decoded position sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,

    /// Instant the last byte of the frame was read
    pub arrival: DateTime<Utc>,
}

/// Result of feeding bytes to the frame decoder
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// Complete frame with a valid checksum
    Sample(DecodedSample),

    /// Complete frame whose checksum did not match; the frame was discarded
    ChecksumError { expected: u8, received: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(PREAMBLE, [0x59, 0x35]);
        assert_eq!(FRAME_SIZE_WITH_CHECKSUM, 15);
        assert_eq!(FRAME_SIZE_WITHOUT_CHECKSUM, 14);
    }

    #[test]
    fn test_payload_size_per_mode() {
        assert_eq!(ChecksumMode::IncludePreamble.payload_size(), 13);
        assert_eq!(ChecksumMode::ExcludePreamble.payload_size(), 13);
        assert_eq!(ChecksumMode::Disabled.payload_size(), 12);
    }

    #[test]
    fn test_checksum_span_bounds() {
        let frame: Vec<u8> = (0u8..15).collect();

        let span = ChecksumMode::IncludePreamble.checksum_span(&frame).unwrap();
        assert_eq!(span.first(), Some(&0));
        assert_eq!(span.len(), 14);

        let span = ChecksumMode::ExcludePreamble.checksum_span(&frame).unwrap();
        assert_eq!(span.first(), Some(&2));
        assert_eq!(span.len(), 12);

        assert!(ChecksumMode::Disabled.checksum_span(&frame).is_none());
    }

    #[test]
    fn test_checksum_span_short_frame() {
        let frame = [0x59, 0x35, 0x00];
        assert!(ChecksumMode::IncludePreamble.checksum_span(&frame).is_none());
    }

    #[test]
    fn test_default_mode_includes_preamble() {
        assert_eq!(ChecksumMode::default(), ChecksumMode::IncludePreamble);
    }
}
