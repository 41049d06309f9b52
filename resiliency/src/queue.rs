//! Queued message store
//!
//! Messages that could not be delivered to a downstream are parked here and
//! replayed by the self-healing monitor once the downstream recovers.
//! Workers claim messages through an atomic PENDING -> PROCESSING step so a
//! message is never dispatched twice.

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Queued message lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueuedMessageStatus {
    /// Waiting to be dispatched
    Pending,
    /// Claimed by a worker
    Processing,
    /// Delivered successfully
    Processed,
    /// Retry budget exhausted
    Failed,
    /// Waiting for its next retry slot
    Retry,
    /// Expired before delivery
    Expired,
    /// Cancelled by an operator
    Cancelled,
}

/// A message parked for later delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// Message ID
    pub message_id: Uuid,

    /// Message type (e.g. pacs.008, DEBIT_REQUEST)
    pub message_type: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Target downstream service
    pub service_name: String,

    /// Target endpoint
    pub endpoint_url: String,

    /// HTTP method for redelivery
    pub http_method: String,

    /// Opaque payload
    pub payload: serde_json::Value,

    /// Lifecycle status
    pub status: QueuedMessageStatus,

    /// Replay order: higher first
    pub priority: i32,

    /// Delivery attempts so far
    pub retry_count: u32,

    /// Retry budget
    pub max_retries: u32,

    /// Earliest next delivery attempt
    pub next_retry_at: Option<DateTime<Utc>>,

    /// Correlates with the originating transaction
    pub correlation_id: Option<String>,

    /// Messages older than this are swept to EXPIRED
    pub expires_at: Option<DateTime<Utc>>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl QueuedMessage {
    /// Create a pending message
    pub fn new(
        message_type: impl Into<String>,
        tenant_id: impl Into<String>,
        service_name: impl Into<String>,
        endpoint_url: impl Into<String>,
        http_method: impl Into<String>,
        payload: serde_json::Value,
        priority: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            message_id: Uuid::new_v4(),
            message_type: message_type.into(),
            tenant_id: tenant_id.into(),
            service_name: service_name.into(),
            endpoint_url: endpoint_url.into(),
            http_method: http_method.into(),
            payload,
            status: QueuedMessageStatus::Pending,
            priority,
            retry_count: 0,
            max_retries: 3,
            next_retry_at: None,
            correlation_id: None,
            expires_at: Some(now + Duration::days(7)),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the message may be claimed at `now`
    fn claimable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            QueuedMessageStatus::Pending => true,
            QueuedMessageStatus::Retry => {
                self.next_retry_at.map(|at| at <= now).unwrap_or(true)
            }
            _ => false,
        }
    }
}

/// Filter for listing queued messages
#[derive(Debug, Clone, Default)]
pub struct QueuedMessageFilter {
    /// Restrict to one tenant
    pub tenant_id: Option<String>,

    /// Restrict to one service
    pub service_name: Option<String>,

    /// Restrict to one status
    pub status: Option<QueuedMessageStatus>,
}

/// In-process queued message store with atomic claim semantics
pub struct QueuedMessageStore {
    messages: Mutex<HashMap<Uuid, QueuedMessage>>,
}

impl QueuedMessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
        }
    }

    /// Park a message
    pub fn enqueue(&self, message: QueuedMessage) -> Uuid {
        let id = message.message_id;
        tracing::info!(
            "Queueing {} message {} for service {} (priority {})",
            message.message_type,
            id,
            message.service_name,
            message.priority
        );
        self.messages.lock().insert(id, message);
        id
    }

    /// Claim the next deliverable message for a service.
    ///
    /// Selection order is priority descending, created_at ascending; the
    /// claimed message atomically moves to PROCESSING.
    pub fn claim_next(&self, service_name: &str, tenant_id: Option<&str>) -> Option<QueuedMessage> {
        let now = Utc::now();
        let mut messages = self.messages.lock();

        let id = messages
            .values()
            .filter(|m| m.service_name == service_name && m.claimable(now))
            .filter(|m| tenant_id.map(|t| m.tenant_id == t).unwrap_or(true))
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
            })
            .map(|m| m.message_id)?;

        let message = messages.get_mut(&id)?;
        message.status = QueuedMessageStatus::Processing;
        message.updated_at = now;
        Some(message.clone())
    }

    /// Mark a claimed message as delivered
    pub fn mark_processed(&self, message_id: Uuid) -> Result<()> {
        self.transition(message_id, |m| {
            m.status = QueuedMessageStatus::Processed;
        })
    }

    /// Record a delivery failure.
    ///
    /// The message returns to RETRY with a backoff slot while budget
    /// remains, otherwise it parks as FAILED.
    pub fn mark_failed(&self, message_id: Uuid, reason: &str) -> Result<()> {
        self.transition(message_id, |m| {
            m.retry_count += 1;
            if m.retry_count >= m.max_retries {
                tracing::warn!(
                    "Message {} failed permanently after {} attempts: {}",
                    message_id,
                    m.retry_count,
                    reason
                );
                m.status = QueuedMessageStatus::Failed;
                m.next_retry_at = None;
            } else {
                let delay = Duration::minutes(5 * 2i64.pow(m.retry_count.saturating_sub(1)));
                m.status = QueuedMessageStatus::Retry;
                m.next_retry_at = Some(Utc::now() + delay);
            }
        })
    }

    /// Cancel a message
    pub fn cancel(&self, message_id: Uuid) -> Result<()> {
        self.transition(message_id, |m| {
            m.status = QueuedMessageStatus::Cancelled;
        })
    }

    /// Return FAILED messages with remaining budget to RETRY; used by
    /// auto-retry. Returns the number of revived messages.
    pub fn revive_failed(&self, tenant_id: Option<&str>) -> usize {
        let mut messages = self.messages.lock();
        let now = Utc::now();
        let mut revived = 0;

        for message in messages.values_mut() {
            if message.status != QueuedMessageStatus::Failed {
                continue;
            }
            if let Some(tenant) = tenant_id {
                if message.tenant_id != tenant {
                    continue;
                }
            }
            message.status = QueuedMessageStatus::Retry;
            message.next_retry_at = Some(now);
            message.updated_at = now;
            revived += 1;
        }
        revived
    }

    /// Sweep expired messages; returns the number expired
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut messages = self.messages.lock();
        let mut expired = 0;

        for message in messages.values_mut() {
            let past_expiry = message.expires_at.map(|at| at <= now).unwrap_or(false);
            if past_expiry
                && matches!(
                    message.status,
                    QueuedMessageStatus::Pending | QueuedMessageStatus::Retry
                )
            {
                message.status = QueuedMessageStatus::Expired;
                message.updated_at = now;
                expired += 1;
            }
        }
        expired
    }

    /// List messages matching a filter, priority desc / created_at asc
    pub fn list(&self, filter: &QueuedMessageFilter) -> Vec<QueuedMessage> {
        let messages = self.messages.lock();
        let mut result: Vec<QueuedMessage> = messages
            .values()
            .filter(|m| {
                filter
                    .tenant_id
                    .as_deref()
                    .map(|t| m.tenant_id == t)
                    .unwrap_or(true)
                    && filter
                        .service_name
                        .as_deref()
                        .map(|s| m.service_name == s)
                        .unwrap_or(true)
                    && filter.status.map(|s| m.status == s).unwrap_or(true)
            })
            .cloned()
            .collect();

        result.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        result
    }

    /// Fetch one message
    pub fn get(&self, message_id: Uuid) -> Option<QueuedMessage> {
        self.messages.lock().get(&message_id).cloned()
    }

    /// Pending + retry backlog for a service
    pub fn backlog(&self, service_name: &str) -> usize {
        let now = Utc::now();
        self.messages
            .lock()
            .values()
            .filter(|m| m.service_name == service_name && m.claimable(now))
            .count()
    }

    fn transition<F: FnOnce(&mut QueuedMessage)>(&self, message_id: Uuid, f: F) -> Result<()> {
        let mut messages = self.messages.lock();
        let message = messages
            .get_mut(&message_id)
            .ok_or_else(|| Error::Queue(format!("unknown message {}", message_id)))?;
        f(message);
        message.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for QueuedMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(service: &str, priority: i32) -> QueuedMessage {
        QueuedMessage::new(
            "pacs.008",
            "demo-bank",
            service,
            "https://core/payments",
            "POST",
            serde_json::json!({"amount": "100.00"}),
            priority,
        )
    }

    #[test]
    fn test_claim_order_priority_then_age() {
        let store = QueuedMessageStore::new();

        let mut low = message("core-banking", 1);
        low.created_at = Utc::now() - Duration::minutes(10);
        let low_id = store.enqueue(low);

        let mut old_high = message("core-banking", 5);
        old_high.created_at = Utc::now() - Duration::minutes(5);
        let old_high_id = store.enqueue(old_high);

        let new_high = message("core-banking", 5);
        let new_high_id = store.enqueue(new_high);

        assert_eq!(store.claim_next("core-banking", None).unwrap().message_id, old_high_id);
        assert_eq!(store.claim_next("core-banking", None).unwrap().message_id, new_high_id);
        assert_eq!(store.claim_next("core-banking", None).unwrap().message_id, low_id);
        assert!(store.claim_next("core-banking", None).is_none());
    }

    #[test]
    fn test_claim_is_exclusive() {
        let store = QueuedMessageStore::new();
        store.enqueue(message("core-banking", 1));

        assert!(store.claim_next("core-banking", None).is_some());
        // Claimed message is PROCESSING and cannot be claimed again
        assert!(store.claim_next("core-banking", None).is_none());
    }

    #[test]
    fn test_failure_backoff_then_permanent() {
        let store = QueuedMessageStore::new();
        let mut msg = message("core-banking", 1);
        msg.max_retries = 2;
        let id = store.enqueue(msg);

        store.claim_next("core-banking", None).unwrap();
        store.mark_failed(id, "connection refused").unwrap();
        let after_first = store.get(id).unwrap();
        assert_eq!(after_first.status, QueuedMessageStatus::Retry);
        assert!(after_first.next_retry_at.is_some());

        // Second failure exhausts the budget
        store.mark_failed(id, "connection refused").unwrap();
        assert_eq!(store.get(id).unwrap().status, QueuedMessageStatus::Failed);
    }

    #[test]
    fn test_retry_not_claimable_until_slot() {
        let store = QueuedMessageStore::new();
        let id = store.enqueue(message("core-banking", 1));

        store.claim_next("core-banking", None).unwrap();
        store.mark_failed(id, "timeout").unwrap();

        // next_retry_at is 5 minutes out
        assert!(store.claim_next("core-banking", None).is_none());
    }

    #[test]
    fn test_revive_failed() {
        let store = QueuedMessageStore::new();
        let mut msg = message("core-banking", 1);
        msg.max_retries = 1;
        let id = store.enqueue(msg);

        store.claim_next("core-banking", None).unwrap();
        store.mark_failed(id, "down").unwrap();
        assert_eq!(store.get(id).unwrap().status, QueuedMessageStatus::Failed);

        assert_eq!(store.revive_failed(Some("demo-bank")), 1);
        assert!(store.claim_next("core-banking", None).is_some());
    }

    #[test]
    fn test_sweep_expired() {
        let store = QueuedMessageStore::new();
        let mut msg = message("core-banking", 1);
        msg.expires_at = Some(Utc::now() - Duration::minutes(1));
        let id = store.enqueue(msg);

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.get(id).unwrap().status, QueuedMessageStatus::Expired);
    }

    #[test]
    fn test_list_filters() {
        let store = QueuedMessageStore::new();
        store.enqueue(message("core-banking", 1));
        store.enqueue(message("fraud-api", 1));

        let filter = QueuedMessageFilter {
            service_name: Some("fraud-api".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list(&filter).len(), 1);
        assert_eq!(store.list(&QueuedMessageFilter::default()).len(), 2);
    }
}
