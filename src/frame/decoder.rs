//! # Frame Synchronizer/Decoder
//!
//! Finds frame boundaries in a raw byte stream, verifies checksums and
//! decodes position samples.
//!
//! The decoder is a byte-at-a-time state machine:
//!
//! ```text
//! SeekByte0 --0x59--> SeekByte1 --0x35--> ReadPayload --N bytes--> verify
//!     ^                   |                                          |
//!     +---- other byte ---+ (byte retried as byte 0)                 |
//!     +--------------------------------------------------------------+
//! ```
//!
//! After a checksum failure the consumed payload bytes are dropped; they are
//! not rescanned for an embedded preamble.

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use super::codec::{decode_f32_le, xor_checksum};
use super::protocol::*;
use crate::error::{IngestError, Result};

/// Validate and decode one complete frame
///
/// # Arguments
///
/// * `frame` - Complete frame bytes (preamble, floats, optional checksum)
/// * `mode` - Checksum span the sender used
/// * `arrival` - Timestamp to attach to the sample
///
/// # Errors
///
/// Returns error if:
/// - Frame length does not match `mode` (`OutOfRange`)
/// - Preamble is wrong (`PreambleMismatch`)
/// - Checksum does not match (`Checksum`)
pub fn decode_frame(
    frame: &[u8],
    mode: ChecksumMode,
    arrival: DateTime<Utc>,
) -> Result<DecodedSample> {
    if frame.len() < mode.frame_size() {
        return Err(IngestError::OutOfRange {
            offset: frame.len(),
            len: mode.frame_size(),
        });
    }

    if frame[0] != PREAMBLE_BYTE_0 {
        return Err(IngestError::PreambleMismatch(frame[0]));
    }
    if frame[1] != PREAMBLE_BYTE_1 {
        return Err(IngestError::PreambleMismatch(frame[1]));
    }

    if let Some(span) = mode.checksum_span(frame) {
        let expected = xor_checksum(span);
        let received = frame[PREAMBLE_SIZE + FIELDS_SIZE];
        if expected != received {
            return Err(IngestError::Checksum { expected, received });
        }
    }

    Ok(DecodedSample {
        x: decode_f32_le(frame, PREAMBLE_SIZE)?,
        y: decode_f32_le(frame, PREAMBLE_SIZE + FIELD_SIZE)?,
        z: decode_f32_le(frame, PREAMBLE_SIZE + 2 * FIELD_SIZE)?,
        arrival,
    })
}

/// Synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    SeekByte0,
    SeekByte1,
    ReadPayload,
}

/// Running decoder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames decoded with a valid checksum
    pub frames: u64,

    /// Frames discarded for a checksum mismatch
    pub checksum_errors: u64,

    /// Bytes dropped while hunting for the preamble
    pub preamble_mismatches: u64,
}

/// Streaming frame decoder
#[derive(Debug)]
pub struct FrameDecoder {
    mode: ChecksumMode,
    state: SyncState,
    frame: Vec<u8>,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Create a decoder waiting for the first preamble byte
    pub fn new(mode: ChecksumMode) -> Self {
        Self {
            mode,
            state: SyncState::SeekByte0,
            frame: Vec::with_capacity(mode.frame_size()),
            stats: DecoderStats::default(),
        }
    }

    /// Checksum mode this decoder verifies against
    pub fn mode(&self) -> ChecksumMode {
        self.mode
    }

    /// Counters accumulated since creation
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// True while the decoder is between frames
    pub fn is_idle(&self) -> bool {
        self.state == SyncState::SeekByte0
    }

    /// Feed one byte
    ///
    /// Returns an event when this byte completes a frame, `None` otherwise.
    /// Never fails: bad data only moves the decoder back to preamble search.
    pub fn push(&mut self, byte: u8) -> Option<FrameEvent> {
        match self.state {
            SyncState::SeekByte0 => {
                self.seek_byte0(byte);
                None
            }
            SyncState::SeekByte1 => {
                if byte == PREAMBLE_BYTE_1 {
                    self.frame.push(byte);
                    self.state = SyncState::ReadPayload;
                } else {
                    // `59 59 35` must still sync on the second 0x59
                    self.state = SyncState::SeekByte0;
                    self.frame.clear();
                    self.seek_byte0(byte);
                }
                None
            }
            SyncState::ReadPayload => {
                self.frame.push(byte);
                if self.frame.len() < self.mode.frame_size() {
                    return None;
                }

                let event = self.verify(Utc::now());
                self.frame.clear();
                self.state = SyncState::SeekByte0;
                event
            }
        }
    }

    /// Feed a chunk of bytes, collecting every completed frame event
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FrameEvent> {
        bytes.iter().filter_map(|&byte| self.push(byte)).collect()
    }

    fn seek_byte0(&mut self, byte: u8) {
        if byte == PREAMBLE_BYTE_0 {
            self.frame.clear();
            self.frame.push(byte);
            self.state = SyncState::SeekByte1;
        } else {
            self.stats.preamble_mismatches += 1;
        }
    }

    fn verify(&mut self, arrival: DateTime<Utc>) -> Option<FrameEvent> {
        match decode_frame(&self.frame, self.mode, arrival) {
            Ok(sample) => {
                self.stats.frames += 1;
                debug!("Decoded frame: x={} y={} z={}", sample.x, sample.y, sample.z);
                Some(FrameEvent::Sample(sample))
            }
            Err(IngestError::Checksum { expected, received }) => {
                self.stats.checksum_errors += 1;
                warn!(
                    "Checksum error: expected 0x{:02X}, got 0x{:02X}",
                    expected, received
                );
                Some(FrameEvent::ChecksumError { expected, received })
            }
            Err(e) => {
                // Unreachable with a correctly assembled frame buffer
                error!("Discarding frame: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encoder::encode_sample_frame;

    fn samples(events: &[FrameEvent]) -> Vec<(f32, f32, f32)> {
        events
            .iter()
            .filter_map(|event| match event {
                FrameEvent::Sample(s) => Some((s.x, s.y, s.z)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_decode_known_frame() {
        let mut frame = vec![
            0x59, 0x35, 0x00, 0x00, 0xC8, 0x42, 0x00, 0x00, 0xC8, 0x42, 0x00, 0x00, 0xC8, 0x42,
        ];
        frame.push(xor_checksum(&frame));

        let mut decoder = FrameDecoder::new(ChecksumMode::IncludePreamble);
        let events = decoder.feed(&frame);

        assert_eq!(samples(&events), vec![(100.0, 100.0, 100.0)]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_round_trip_both_spans() {
        for mode in [
            ChecksumMode::IncludePreamble,
            ChecksumMode::ExcludePreamble,
            ChecksumMode::Disabled,
        ] {
            let mut decoder = FrameDecoder::new(mode);
            let mut stream = Vec::new();
            stream.extend(encode_sample_frame(1.5, -2.25, 1e-3, mode));
            stream.extend(encode_sample_frame(f32::MAX, 0.0, -0.0, mode));

            let events = decoder.feed(&stream);
            assert_eq!(
                samples(&events),
                vec![(1.5, -2.25, 1e-3), (f32::MAX, 0.0, -0.0)],
                "mode {:?}",
                mode
            );
            assert_eq!(decoder.stats().frames, 2);
        }
    }

    #[test]
    fn test_wrong_span_is_rejected() {
        let frame = encode_sample_frame(1.0, 2.0, 3.0, ChecksumMode::ExcludePreamble);
        let mut decoder = FrameDecoder::new(ChecksumMode::IncludePreamble);

        let events = decoder.feed(&frame);
        assert!(matches!(events.as_slice(), [FrameEvent::ChecksumError { .. }]));
    }

    #[test]
    fn test_resync_after_corrupted_payload() {
        let mut bad = encode_sample_frame(1.0, 2.0, 3.0, ChecksumMode::IncludePreamble);
        bad[5] ^= 0x10;
        let good = encode_sample_frame(4.0, 5.0, 6.0, ChecksumMode::IncludePreamble);

        let mut stream = bad;
        stream.extend(good);

        let mut decoder = FrameDecoder::new(ChecksumMode::IncludePreamble);
        let events = decoder.feed(&stream);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], FrameEvent::ChecksumError { .. }));
        assert_eq!(samples(&events), vec![(4.0, 5.0, 6.0)]);
        assert_eq!(decoder.stats().checksum_errors, 1);
        assert_eq!(decoder.stats().frames, 1);
    }

    #[test]
    fn test_resync_after_leading_garbage() {
        let mut stream = vec![0x00, 0xFF, 0x35, 0x59, 0x00];
        stream.extend(encode_sample_frame(7.0, 8.0, 9.0, ChecksumMode::ExcludePreamble));

        let mut decoder = FrameDecoder::new(ChecksumMode::ExcludePreamble);
        let events = decoder.feed(&stream);

        assert_eq!(samples(&events), vec![(7.0, 8.0, 9.0)]);
        assert!(decoder.stats().preamble_mismatches >= 4);
    }

    #[test]
    fn test_repeated_first_preamble_byte() {
        let mut stream = vec![0x59];
        stream.extend(encode_sample_frame(1.0, 1.0, 1.0, ChecksumMode::IncludePreamble));

        let mut decoder = FrameDecoder::new(ChecksumMode::IncludePreamble);
        let events = decoder.feed(&stream);

        assert_eq!(samples(&events), vec![(1.0, 1.0, 1.0)]);
    }

    #[test]
    fn test_preamble_inside_payload_is_not_resynced() {
        // Build a float whose bytes contain 0x59 0x35
        let tricky = f32::from_le_bytes([0x59, 0x35, 0x59, 0x35]);
        let frame = encode_sample_frame(tricky, tricky, tricky, ChecksumMode::IncludePreamble);

        let mut stream = frame.clone();
        stream.extend(frame);

        let mut decoder = FrameDecoder::new(ChecksumMode::IncludePreamble);
        let events = decoder.feed(&stream);

        assert_eq!(events.len(), 2);
        assert_eq!(decoder.stats().frames, 2);
        assert_eq!(decoder.stats().checksum_errors, 0);
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        let frame = encode_sample_frame(3.0, 2.0, 1.0, ChecksumMode::IncludePreamble);
        let mut decoder = FrameDecoder::new(ChecksumMode::IncludePreamble);

        assert!(decoder.feed(&frame[..9]).is_empty());
        assert!(!decoder.is_idle());

        let events = decoder.feed(&frame[9..]);
        assert_eq!(samples(&events), vec![(3.0, 2.0, 1.0)]);
    }

    #[test]
    fn test_arrival_timestamp_set_on_completion() {
        let frame = encode_sample_frame(0.0, 0.0, 0.0, ChecksumMode::IncludePreamble);
        let mut decoder = FrameDecoder::new(ChecksumMode::IncludePreamble);

        let before = Utc::now();
        let events = decoder.feed(&frame);
        let after = Utc::now();

        match &events[0] {
            FrameEvent::Sample(sample) => {
                assert!(sample.arrival >= before && sample.arrival <= after);
            }
            other => panic!("Expected sample, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_frame_too_short() {
        let result = decode_frame(&[0x59, 0x35, 0x00], ChecksumMode::IncludePreamble, Utc::now());
        assert!(matches!(result, Err(IngestError::OutOfRange { .. })));
    }

    #[test]
    fn test_decode_frame_invalid_preamble() {
        let mut frame = encode_sample_frame(1.0, 2.0, 3.0, ChecksumMode::Disabled);
        frame[1] = 0x36;

        let result = decode_frame(&frame, ChecksumMode::Disabled, Utc::now());
        assert!(matches!(result, Err(IngestError::PreambleMismatch(0x36))));
    }

    #[test]
    fn test_decode_frame_checksum_error() {
        let mut frame = encode_sample_frame(1.0, 2.0, 3.0, ChecksumMode::IncludePreamble);
        frame[14] ^= 0xFF;

        let result = decode_frame(&frame, ChecksumMode::IncludePreamble, Utc::now());
        assert!(matches!(result, Err(IngestError::Checksum { .. })));
    }
}
