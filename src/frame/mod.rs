//! # Serial Frame Module
//!
//! Binary position frames carried over serial links.
//!
//! This module handles:
//! - Little-endian f32 field encoding
//! - XOR checksum over a configurable span
//! - Frame synchronization, validation and resynchronization
//! - Frame encoding for the talker side

pub mod protocol;
pub mod codec;
pub mod encoder;
pub mod decoder;
