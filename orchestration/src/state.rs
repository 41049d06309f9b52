//! Payment state machine
//!
//! ```text
//! INIT -> DEBIT_PENDING -> DEBIT_OK -> CREDIT_PENDING -> CREDIT_OK -> SETTLED
//!               |                           |
//!               v                           v
//!          REPAIR(DEBIT_*)            REPAIR(CREDIT_*)
//! ```
//!
//! plus the gate states the fraud pipeline and the envelope introduce
//! before any ledger effect: REJECTED, SUSPENDED, QUEUED, BATCHED.

use serde::{Deserialize, Serialize};

/// State of one orchestrated payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    /// Accepted, nothing attempted
    Init,
    /// Halted by a fraud REJECT before any ledger effect
    Rejected,
    /// Parked for review by MANUAL_REVIEW / HOLD / ESCALATE
    Suspended,
    /// Parked in the queued-message store while the downstream is unavailable
    Queued,
    /// Waiting in a batch group for the next dispatch window
    Batched,
    /// Debit submitted, awaiting confirmation
    DebitPending,
    /// Debit confirmed
    DebitOk,
    /// Credit submitted or awaiting the clearing callback
    CreditPending,
    /// Credit confirmed
    CreditOk,
    /// Both legs final
    Settled,
    /// A repair record owns the payment
    Repairing,
    /// Cancelled before any ledger effect
    Cancelled,
}

impl PaymentState {
    /// Whether no further orchestration happens from this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Rejected
                | PaymentState::Settled
                | PaymentState::Repairing
                | PaymentState::Cancelled
        )
    }

    /// States a resubmission may safely re-drive.
    ///
    /// Queued and batched payments have no ledger effect yet; everything
    /// else reuses the recorded outcome.
    pub fn is_redrivable(&self) -> bool {
        matches!(
            self,
            PaymentState::Init | PaymentState::Queued | PaymentState::Batched
        )
    }

    /// Legal forward transitions
    pub fn can_transition_to(&self, next: PaymentState) -> bool {
        use PaymentState::*;
        match (self, next) {
            (Init, Rejected | Suspended | Queued | Batched | DebitPending | Cancelled) => true,
            (Queued, DebitPending | Queued | Rejected | Suspended | Cancelled) => true,
            (Batched, DebitPending | Cancelled) => true,
            (Suspended, Cancelled | DebitPending) => true,
            (DebitPending, DebitOk | Repairing | Queued) => true,
            (DebitOk, CreditPending | Repairing) => true,
            (CreditPending, CreditOk | Repairing) => true,
            (CreditOk, Settled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PaymentState::Init => "INIT",
            PaymentState::Rejected => "REJECTED",
            PaymentState::Suspended => "SUSPENDED",
            PaymentState::Queued => "QUEUED",
            PaymentState::Batched => "BATCHED",
            PaymentState::DebitPending => "DEBIT_PENDING",
            PaymentState::DebitOk => "DEBIT_OK",
            PaymentState::CreditPending => "CREDIT_PENDING",
            PaymentState::CreditOk => "CREDIT_OK",
            PaymentState::Settled => "SETTLED",
            PaymentState::Repairing => "REPAIRING",
            PaymentState::Cancelled => "CANCELLED",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            PaymentState::Init,
            PaymentState::DebitPending,
            PaymentState::DebitOk,
            PaymentState::CreditPending,
            PaymentState::CreditOk,
            PaymentState::Settled,
        ];
        for window in path.windows(2) {
            assert!(
                window[0].can_transition_to(window[1]),
                "{} -> {} should be legal",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn test_credit_never_before_debit() {
        assert!(!PaymentState::Init.can_transition_to(PaymentState::CreditPending));
        assert!(!PaymentState::DebitPending.can_transition_to(PaymentState::CreditPending));
        assert!(!PaymentState::Queued.can_transition_to(PaymentState::CreditOk));
    }

    #[test]
    fn test_terminal_states() {
        assert!(PaymentState::Settled.is_terminal());
        assert!(PaymentState::Rejected.is_terminal());
        assert!(PaymentState::Repairing.is_terminal());
        assert!(!PaymentState::Settled.can_transition_to(PaymentState::Init));
    }

    #[test]
    fn test_redrivable_states() {
        assert!(PaymentState::Queued.is_redrivable());
        assert!(PaymentState::Batched.is_redrivable());
        assert!(!PaymentState::DebitOk.is_redrivable());
        assert!(!PaymentState::Settled.is_redrivable());
    }
}
