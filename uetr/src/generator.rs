//! UETR generation and format operations
//!
//! A UETR is 36 characters: `timestamp14 | systemId4 | messageTypeId8 |
//! random10`. Once emitted it is immutable; two UETRs are related when
//! their timestamp and system id segments coincide.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::Rng;
use regex::Regex;
use std::collections::HashSet;

/// Full UETR format: `^[0-9]{14}[A-Z0-9]{4}[A-Z0-9]{8}[A-Z0-9]{10}$`
static UETR_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{14}[A-Z0-9]{4}[A-Z0-9]{8}[A-Z0-9]{10}$").expect("valid regex"));

const TIMESTAMP_LEN: usize = 14;
const SYSTEM_ID_LEN: usize = 4;
const MESSAGE_TYPE_LEN: usize = 8;
const RANDOM_LEN: usize = 10;

/// Segments extracted from a UETR
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UetrSegments {
    /// Embedded generation instant
    pub timestamp: DateTime<Utc>,

    /// Originating system identifier (4 chars)
    pub system_id: String,

    /// Normalized message type identifier (8 chars)
    pub message_type_id: String,
}

/// UETR generator bound to one system identifier
pub struct UetrGenerator {
    system_id: String,
    /// UETRs issued in the current second, for collision re-rolls
    issued: Mutex<(String, HashSet<String>)>,
}

impl UetrGenerator {
    /// Default system identifier for this middleware
    pub const DEFAULT_SYSTEM_ID: &'static str = "PGRD";

    /// Create a generator; the system id is normalized to 4 characters
    pub fn new(system_id: impl Into<String>) -> Self {
        Self {
            system_id: normalize_segment(&system_id.into(), SYSTEM_ID_LEN),
            issued: Mutex::new((String::new(), HashSet::new())),
        }
    }

    /// The normalized system identifier embedded in generated references
    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    /// Generate a fresh UETR for a message type.
    ///
    /// Collisions inside one timestamp tick are resolved by re-rolling the
    /// random suffix.
    pub fn generate(&self, message_type: &str, tenant_id: &str) -> String {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let message_type_id = normalize_segment(message_type, MESSAGE_TYPE_LEN);

        let mut issued = self.issued.lock();
        if issued.0 != timestamp {
            issued.0 = timestamp.clone();
            issued.1.clear();
        }

        loop {
            let uetr = format!(
                "{}{}{}{}",
                timestamp,
                self.system_id,
                message_type_id,
                random_suffix()
            );
            if issued.1.insert(uetr.clone()) {
                tracing::debug!("Generated UETR {} for tenant {}", uetr, tenant_id);
                return uetr;
            }
        }
    }

    /// Check a reference against the UETR format
    pub fn validate_format(&self, uetr: &str) -> bool {
        validate_format(uetr)
    }

    /// Extract the embedded segments of a UETR
    pub fn extract(&self, uetr: &str) -> Result<UetrSegments> {
        extract(uetr)
    }

    /// Whether two UETRs share timestamp and system id
    pub fn are_related(&self, a: &str, b: &str) -> bool {
        are_related(a, b)
    }
}

impl Default for UetrGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SYSTEM_ID)
    }
}

/// Check a reference against the UETR format
pub fn validate_format(uetr: &str) -> bool {
    UETR_FORMAT.is_match(uetr)
}

/// Extract `{timestamp, system_id, message_type_id}` from a UETR
pub fn extract(uetr: &str) -> Result<UetrSegments> {
    if !validate_format(uetr) {
        return Err(Error::InvalidFormat(uetr.to_string()));
    }

    let timestamp_raw = &uetr[..TIMESTAMP_LEN];
    let system_id = &uetr[TIMESTAMP_LEN..TIMESTAMP_LEN + SYSTEM_ID_LEN];
    let message_type_id =
        &uetr[TIMESTAMP_LEN + SYSTEM_ID_LEN..TIMESTAMP_LEN + SYSTEM_ID_LEN + MESSAGE_TYPE_LEN];

    let naive = NaiveDateTime::parse_from_str(timestamp_raw, "%Y%m%d%H%M%S")
        .map_err(|_| Error::InvalidTimestamp(timestamp_raw.to_string()))?;

    Ok(UetrSegments {
        timestamp: naive.and_utc(),
        system_id: system_id.to_string(),
        message_type_id: message_type_id.to_string(),
    })
}

/// Whether two UETRs share timestamp and system id segments
pub fn are_related(a: &str, b: &str) -> bool {
    const RELATED_LEN: usize = TIMESTAMP_LEN + SYSTEM_ID_LEN;
    a.len() >= RELATED_LEN
        && b.len() >= RELATED_LEN
        && a.as_bytes()[..RELATED_LEN] == b.as_bytes()[..RELATED_LEN]
}

/// Normalize free text into a fixed-width A-Z0-9 segment.
///
/// Uppercases, drops everything outside A-Z0-9, truncates, and right-pads
/// with `X`. `pacs.008` becomes `PACS008X` for width 8.
pub fn normalize_segment(value: &str, width: usize) -> String {
    let mut segment: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(width)
        .collect();
    while segment.len() < width {
        segment.push('X');
    }
    segment
}

fn random_suffix() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..RANDOM_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
