//! UETR Service
//!
//! Generates, validates, and tracks Unique End-to-End Transaction
//! References across every system a payment touches.
//!
//! # Format
//!
//! 36 characters: `timestamp14 | systemId4 | messageTypeId8 | random10`,
//! matching `^[0-9]{14}[A-Z0-9]{4}[A-Z0-9]{8}[A-Z0-9]{10}$`. Two UETRs are
//! related when their timestamp and system id segments coincide.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod generator;
pub mod tracking;

// Re-exports
pub use error::{Error, Result};
pub use generator::{
    are_related, extract, normalize_segment, validate_format, UetrGenerator, UetrSegments,
};
pub use tracking::{
    Direction, TrackingSearch, UetrStatistics, UetrTrackingRecord, UetrTrackingService,
};
