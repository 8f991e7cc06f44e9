//! # Record Module
//!
//! Flat records: the single-level, ordered key/value rows the CSV logger
//! consumes, and the flattener that produces them from JSON documents.

pub mod value;
pub mod flatten;

pub use flatten::{flatten, parse_document};
pub use value::{FlatRecord, LeafValue};
