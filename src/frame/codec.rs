//! # Byte-Value Codec
//!
//! Fixed-width float encoding and the XOR checksum used by serial frames.
//!
//! **Float format**: IEEE-754 single precision, little endian
//! **Checksum**: XOR of every covered byte, initial value 0x00

use super::protocol::FIELD_SIZE;
use crate::error::{IngestError, Result};

/// Encode an `f32` as 4 little-endian bytes
pub fn encode_f32_le(value: f32) -> [u8; FIELD_SIZE] {
    value.to_le_bytes()
}

/// Decode a little-endian `f32` starting at `offset`
///
/// # Errors
///
/// Returns `OutOfRange` if `offset + 4` exceeds `bytes.len()`
///
/// # Examples
///
/// ```
/// use telemetry_ingest::frame::codec::decode_f32_le;
///
/// let bytes = [0x00, 0x00, 0xC8, 0x42];
/// assert_eq!(decode_f32_le(&bytes, 0).unwrap(), 100.0);
/// ```
pub fn decode_f32_le(bytes: &[u8], offset: usize) -> Result<f32> {
    let out_of_range = || IngestError::OutOfRange {
        offset,
        len: bytes.len(),
    };

    let end = offset.checked_add(FIELD_SIZE).ok_or_else(out_of_range)?;
    let raw: [u8; FIELD_SIZE] = bytes
        .get(offset..end)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(out_of_range)?;

    Ok(f32::from_le_bytes(raw))
}

/// XOR-reduce a byte slice
///
/// The checksum of an empty slice is `0x00`.
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc ^ byte)
}
