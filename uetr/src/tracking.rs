//! UETR tracking records and journey assembly
//!
//! Every state transition across systems is recorded against the payment's
//! UETR. Records append monotonically; the `journey` for a UETR is the
//! ordered list of its tracking records.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message direction relative to this middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Received from a bank client or clearing system
    Inbound,
    /// Sent towards a core banking system or clearing system
    Outbound,
}

/// One recorded state transition for a UETR
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UetrTrackingRecord {
    /// Record ID
    pub record_id: Uuid,

    /// The tracked UETR
    pub uetr: String,

    /// ISO 20022 message type (e.g. pacs.008)
    pub message_type: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Business transaction reference
    pub transaction_reference: String,

    /// Direction of the hop
    pub direction: Direction,

    /// Status at this transition (e.g. PENDING, PROCESSING, SETTLED)
    pub status: String,

    /// Human-readable status reason
    pub status_reason: Option<String>,

    /// System that produced the transition
    pub processing_system: String,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl UetrTrackingRecord {
    /// Create a record stamped now
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uetr: impl Into<String>,
        message_type: impl Into<String>,
        tenant_id: impl Into<String>,
        transaction_reference: impl Into<String>,
        direction: Direction,
        status: impl Into<String>,
        status_reason: Option<String>,
        processing_system: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            record_id: Uuid::new_v4(),
            uetr: uetr.into(),
            message_type: message_type.into(),
            tenant_id: tenant_id.into(),
            transaction_reference: transaction_reference.into(),
            direction,
            status: status.into(),
            status_reason,
            processing_system: processing_system.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Search filters over tracking records
#[derive(Debug, Clone, Default)]
pub struct TrackingSearch {
    /// Restrict to one tenant
    pub tenant_id: Option<String>,

    /// Restrict to one message type
    pub message_type: Option<String>,

    /// Restrict to one status
    pub status: Option<String>,

    /// Restrict to one direction
    pub direction: Option<Direction>,

    /// Records created at or after this instant
    pub from: Option<DateTime<Utc>>,

    /// Records created at or before this instant
    pub to: Option<DateTime<Utc>>,
}

/// Aggregated journey statistics for a tenant
#[derive(Debug, Clone, Serialize)]
pub struct UetrStatistics {
    /// Distinct UETRs observed
    pub total: usize,

    /// Journeys whose latest status is COMPLETED or SETTLED
    pub completed: usize,

    /// Journeys whose latest status is FAILED or REJECTED
    pub failed: usize,

    /// Everything else still in flight
    pub pending: usize,

    /// Mean first-to-last record latency over completed journeys
    pub avg_processing_ms: f64,
}

/// Terminal success statuses for journey statistics
const COMPLETED_STATUSES: [&str; 2] = ["COMPLETED", "SETTLED"];

/// Terminal failure statuses for journey statistics
const FAILED_STATUSES: [&str; 2] = ["FAILED", "REJECTED"];

/// Append-only store of tracking records.
///
/// Records are held in insertion order under one lock, so readers observe a
/// monotonic journey: a record is never visible before its predecessors.
pub struct UetrTrackingService {
    records: Mutex<Vec<UetrTrackingRecord>>,
}

impl UetrTrackingService {
    /// Create an empty tracking service
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Append a tracking record
    pub fn record(&self, record: UetrTrackingRecord) {
        tracing::debug!(
            "UETR {} -> {} ({})",
            record.uetr,
            record.status,
            record.processing_system
        );
        self.records.lock().push(record);
    }

    /// The ordered journey for a UETR.
    ///
    /// Ordered by `updated_at` ascending; ties preserve insertion order.
    pub fn get_journey(&self, uetr: &str) -> Result<Vec<UetrTrackingRecord>> {
        let records = self.records.lock();
        let mut journey: Vec<UetrTrackingRecord> = records
            .iter()
            .filter(|r| r.uetr == uetr)
            .cloned()
            .collect();

        if journey.is_empty() {
            return Err(Error::UnknownUetr(uetr.to_string()));
        }

        journey.sort_by_key(|r| r.updated_at);
        Ok(journey)
    }

    /// Latest tracking record for a UETR
    pub fn latest(&self, uetr: &str) -> Option<UetrTrackingRecord> {
        self.get_journey(uetr).ok().and_then(|j| j.last().cloned())
    }

    /// Search records by filters, insertion order
    pub fn search(&self, filters: &TrackingSearch) -> Vec<UetrTrackingRecord> {
        let records = self.records.lock();
        records
            .iter()
            .filter(|r| {
                filters
                    .tenant_id
                    .as_deref()
                    .map(|t| r.tenant_id == t)
                    .unwrap_or(true)
                    && filters
                        .message_type
                        .as_deref()
                        .map(|m| r.message_type == m)
                        .unwrap_or(true)
                    && filters
                        .status
                        .as_deref()
                        .map(|s| r.status == s)
                        .unwrap_or(true)
                    && filters.direction.map(|d| r.direction == d).unwrap_or(true)
                    && filters.from.map(|f| r.created_at >= f).unwrap_or(true)
                    && filters.to.map(|t| r.created_at <= t).unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Journey statistics for a tenant over an optional time window
    pub fn statistics(
        &self,
        tenant_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> UetrStatistics {
        let records = self.records.lock();

        let mut journeys: std::collections::HashMap<&str, Vec<&UetrTrackingRecord>> =
            std::collections::HashMap::new();
        for record in records.iter() {
            if record.tenant_id != tenant_id {
                continue;
            }
            if from.map(|f| record.created_at < f).unwrap_or(false) {
                continue;
            }
            if to.map(|t| record.created_at > t).unwrap_or(false) {
                continue;
            }
            journeys.entry(record.uetr.as_str()).or_default().push(record);
        }

        let mut completed = 0;
        let mut failed = 0;
        let mut pending = 0;
        let mut total_latency_ms = 0i64;

        for journey in journeys.values() {
            // Records are scanned in insertion order; last write wins
            let last = journey
                .iter()
                .max_by_key(|r| r.updated_at)
                .expect("journey is non-empty");

            if COMPLETED_STATUSES.contains(&last.status.as_str()) {
                completed += 1;
                let first = journey
                    .iter()
                    .min_by_key(|r| r.created_at)
                    .expect("journey is non-empty");
                total_latency_ms += (last.updated_at - first.created_at).num_milliseconds();
            } else if FAILED_STATUSES.contains(&last.status.as_str()) {
                failed += 1;
            } else {
                pending += 1;
            }
        }

        UetrStatistics {
            total: journeys.len(),
            completed,
            failed,
            pending,
            avg_processing_ms: if completed > 0 {
                total_latency_ms as f64 / completed as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for UetrTrackingService {
    fn default() -> Self {
        Self::new()
    }
}
