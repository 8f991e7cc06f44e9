//! # Telemetry Module
//!
//! Handles telemetry logging to CSV files.
//!
//! This module handles:
//! - One append-only CSV file per destination key
//! - Fixing each file's columns from its first record
//! - Projecting later records onto those columns
//! - Naming per-session files for the pull-loop listeners

pub mod logger;
pub mod session;

pub use logger::DestinationTable;
