//! # Frame Encoder
//!
//! Builds wire frames from position samples, used by the serial talker.

use super::codec::{encode_f32_le, xor_checksum};
use super::protocol::*;

/// Encode a position sample into a complete wire frame
///
/// # Arguments
///
/// * `x`, `y`, `z` - Position fields
/// * `mode` - Checksum span (or no checksum at all)
///
/// # Returns
///
/// * `Vec<u8>` - 15 bytes with a checksum, 14 bytes without
///
/// # Examples
///
/// ```
/// use telemetry_ingest::frame::encoder::encode_sample_frame;
/// use telemetry_ingest::frame::protocol::ChecksumMode;
///
/// let frame = encode_sample_frame(1.0, 2.0, 3.0, ChecksumMode::IncludePreamble);
/// assert_eq!(frame.len(), 15);
/// assert_eq!(&frame[..2], &[0x59, 0x35]);
/// ```
pub fn encode_sample_frame(x: f32, y: f32, z: f32, mode: ChecksumMode) -> Vec<u8> {
    let mut frame = Vec::with_capacity(mode.frame_size());
    frame.extend_from_slice(&PREAMBLE);

    for value in [x, y, z] {
        frame.extend_from_slice(&encode_f32_le(value));
    }

    if let Some(span) = mode.checksum_span(&frame) {
        let checksum = xor_checksum(span);
        frame.push(checksum);
    }

    frame
}
