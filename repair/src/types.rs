//! Transaction repair records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why the repair exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairType {
    /// The debit leg failed
    DebitFailed,
    /// The credit leg failed after a successful debit
    CreditFailed,
    /// The debit leg timed out
    DebitTimeout,
    /// The credit leg timed out after a successful debit
    CreditTimeout,
    /// Parked for human review
    ManualReview,
    /// Unclassified failure
    SystemError,
    /// Some legs landed, some did not
    PartialSuccess,
}

/// Repair lifecycle.
///
/// PENDING -> ASSIGNED -> IN_PROGRESS -> {RESOLVED, FAILED, CANCELLED};
/// terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairStatus {
    /// Awaiting an operator or the retry scheduler
    Pending,
    /// An operator owns it
    Assigned,
    /// A corrective action is running or awaiting verification
    InProgress,
    /// Corrected
    Resolved,
    /// Correction failed permanently
    Failed,
    /// Abandoned without ledger effect
    Cancelled,
}

impl RepairStatus {
    /// Whether no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RepairStatus::Resolved | RepairStatus::Failed | RepairStatus::Cancelled
        )
    }

    /// Whether the lifecycle permits moving to `next`
    pub fn can_transition_to(&self, next: RepairStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (RepairStatus::Pending, RepairStatus::Assigned) => true,
            (RepairStatus::Pending, RepairStatus::InProgress) => true,
            (RepairStatus::Assigned, RepairStatus::InProgress) => true,
            (RepairStatus::Assigned, RepairStatus::Pending) => true,
            (RepairStatus::InProgress, RepairStatus::Pending) => true,
            (_, RepairStatus::Resolved | RepairStatus::Failed | RepairStatus::Cancelled) => true,
            _ => false,
        }
    }
}

/// Status of one ledger leg inside a repair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegStatus {
    /// Leg was never attempted
    NotAttempted,
    /// Leg is in flight
    Pending,
    /// Leg booked
    Success,
    /// Leg rejected
    Failed,
    /// Leg timed out with unknown outcome
    Timeout,
    /// Leg compensated by a reversal
    Reversed,
}

/// The closed set of corrective actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectiveAction {
    /// Resubmit the debit with a `-RETRY-DEBIT` suffixed reference
    RetryDebit,
    /// Resubmit the credit with a `-RETRY-CREDIT` suffixed reference
    RetryCredit,
    /// Retry the debit, then (on success) the credit
    RetryBoth,
    /// Submit a compensating credit for the booked debit
    ReverseDebit,
    /// Submit a compensating debit for the booked credit
    ReverseCredit,
    /// Reverse both legs
    ReverseBoth,
    /// Operator completed the debit out-of-band
    ManualDebit,
    /// Operator completed the credit out-of-band
    ManualCredit,
    /// Operator completed both legs out-of-band
    ManualBoth,
    /// Abandon the transaction; no ledger effect
    CancelTransaction,
    /// Push to priority 10 and back to the queue
    Escalate,
    /// Close the repair with no further work
    NoAction,
}

/// Priority bounds for repairs
pub const MIN_PRIORITY: i32 = 1;
/// Upper priority bound
pub const MAX_PRIORITY: i32 = 10;
/// Repairs at or above this priority are "high priority"
pub const HIGH_PRIORITY: i32 = 8;

/// A payment whose debit/credit lifecycle needs corrective action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRepair {
    /// Repair id
    pub id: Uuid,

    /// Transaction being repaired
    pub transaction_reference: String,

    /// Originating transaction, for retries spawned from other repairs
    pub parent_transaction_id: Option<String>,

    /// Owning tenant
    pub tenant_id: String,

    /// Why the repair exists
    pub repair_type: RepairType,

    /// Lifecycle status
    pub repair_status: RepairStatus,

    /// Debtor account
    pub from_account: String,

    /// Creditor account
    pub to_account: String,

    /// Payment amount
    pub amount: Decimal,

    /// Currency (ISO 4217)
    pub currency: String,

    /// Observed debit leg outcome
    pub debit_status: LegStatus,

    /// Observed credit leg outcome
    pub credit_status: LegStatus,

    /// Automatic retries performed
    pub retry_count: u32,

    /// Automatic retry budget
    pub max_retries: u32,

    /// Next scheduler slot
    pub next_retry_at: Option<DateTime<Utc>>,

    /// Deadline after which the repair escalates to manual review
    pub timeout_at: Option<DateTime<Utc>>,

    /// Priority in [1, 10]
    pub priority: i32,

    /// Operator owning the repair
    pub assigned_to: Option<String>,

    /// Last corrective action applied
    pub corrective_action: Option<CorrectiveAction>,

    /// Operator and executor notes
    pub resolution_notes: Option<String>,

    /// Who resolved it
    pub resolved_by: Option<String>,

    /// When it resolved
    pub resolved_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency version, bumped on every mutation
    pub version: u64,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl TransactionRepair {
    /// Create a PENDING repair with a clamped priority
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_reference: impl Into<String>,
        tenant_id: impl Into<String>,
        repair_type: RepairType,
        from_account: impl Into<String>,
        to_account: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        priority: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_reference: transaction_reference.into(),
            parent_transaction_id: None,
            tenant_id: tenant_id.into(),
            repair_type,
            repair_status: RepairStatus::Pending,
            from_account: from_account.into(),
            to_account: to_account.into(),
            amount,
            currency: currency.into(),
            debit_status: LegStatus::NotAttempted,
            credit_status: LegStatus::NotAttempted,
            retry_count: 0,
            max_retries: 3,
            next_retry_at: Some(now),
            timeout_at: Some(now + chrono::Duration::hours(24)),
            priority: priority.clamp(MIN_PRIORITY, MAX_PRIORITY),
            assigned_to: None,
            corrective_action: None,
            resolution_notes: None,
            resolved_by: None,
            resolved_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether operators should see this first
    pub fn is_high_priority(&self) -> bool {
        self.priority >= HIGH_PRIORITY
    }

    /// Append a line to the resolution notes
    pub fn push_note(&mut self, note: impl AsRef<str>) {
        match &mut self.resolution_notes {
            Some(notes) => {
                notes.push('\n');
                notes.push_str(note.as_ref());
            }
            None => self.resolution_notes = Some(note.as_ref().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_is_clamped() {
        let low = TransactionRepair::new(
            "TXN-1",
            "demo-bank",
            RepairType::DebitFailed,
            "ACC-1",
            "ACC-2",
            Decimal::ONE,
            "USD",
            -3,
        );
        assert_eq!(low.priority, 1);

        let high = TransactionRepair::new(
            "TXN-2",
            "demo-bank",
            RepairType::SystemError,
            "ACC-1",
            "ACC-2",
            Decimal::ONE,
            "USD",
            99,
        );
        assert_eq!(high.priority, 10);
        assert!(high.is_high_priority());
    }

    #[test]
    fn test_terminal_states_immutable() {
        assert!(RepairStatus::Resolved.is_terminal());
        assert!(RepairStatus::Failed.is_terminal());
        assert!(RepairStatus::Cancelled.is_terminal());
        assert!(!RepairStatus::Resolved.can_transition_to(RepairStatus::Pending));
        assert!(!RepairStatus::Cancelled.can_transition_to(RepairStatus::InProgress));
    }

    #[test]
    fn test_lifecycle_transitions() {
        assert!(RepairStatus::Pending.can_transition_to(RepairStatus::Assigned));
        assert!(RepairStatus::Assigned.can_transition_to(RepairStatus::InProgress));
        assert!(RepairStatus::InProgress.can_transition_to(RepairStatus::Resolved));
        // Escalation returns to the queue
        assert!(RepairStatus::InProgress.can_transition_to(RepairStatus::Pending));
        assert!(!RepairStatus::Pending.can_transition_to(RepairStatus::Pending));
    }
}
