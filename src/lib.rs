//! # Telemetry Ingest Library
//!
//! Moves telemetry from sensors and servers onto disk as CSV.
//!
//! This library provides the ingestion pipeline shared by the serial, UDP
//! and motion-capture drivers: a resynchronizing binary frame decoder, a
//! JSON flattener, and a CSV logger that fixes each file's columns from its
//! first record.

pub mod config;
pub mod error;
pub mod frame;
pub mod record;
pub mod telemetry;
pub mod serial;
pub mod udp;
pub mod mocap;
