//! Corrective action execution against the core banking adapter

use crate::types::{CorrectiveAction, LegStatus, RepairStatus, TransactionRepair, MAX_PRIORITY};
use crate::Result;
use banking::{CoreBankingAdapter, CreditRequest, DebitRequest};
use std::sync::Arc;
use tracing::{info, warn};

/// Mutations an executed action applies to the repair record
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// Status after the action
    pub status: RepairStatus,

    /// New debit leg status, when the action touched it
    pub debit_status: Option<LegStatus>,

    /// New credit leg status, when the action touched it
    pub credit_status: Option<LegStatus>,

    /// Priority override
    pub priority: Option<i32>,

    /// Notes appended to the repair
    pub notes: Vec<String>,
}

impl ActionOutcome {
    fn new(status: RepairStatus) -> Self {
        Self {
            status,
            debit_status: None,
            credit_status: None,
            priority: None,
            notes: Vec::new(),
        }
    }
}

/// Executes corrective actions by submitting entries to the core
pub struct RepairActionExecutor {
    adapter: Arc<dyn CoreBankingAdapter>,
}

impl RepairActionExecutor {
    /// Create an executor over a core banking adapter
    pub fn new(adapter: Arc<dyn CoreBankingAdapter>) -> Self {
        Self { adapter }
    }

    /// Execute one corrective action for a repair.
    ///
    /// Ledger-touching actions submit through the adapter; failures leave
    /// the repair IN_PROGRESS with the failure noted rather than erroring
    /// the whole call, so an operator can pick another action.
    pub async fn execute(
        &self,
        repair: &TransactionRepair,
        action: CorrectiveAction,
        actor: &str,
    ) -> Result<ActionOutcome> {
        info!(
            "Executing {:?} on repair {} ({}) by {}",
            action, repair.id, repair.transaction_reference, actor
        );

        let outcome = match action {
            CorrectiveAction::RetryDebit => self.retry_debit(repair).await,
            CorrectiveAction::RetryCredit => self.retry_credit(repair).await,
            CorrectiveAction::RetryBoth => {
                let mut outcome = self.retry_debit(repair).await;
                if outcome.debit_status == Some(LegStatus::Success) {
                    let credit = self.retry_credit(repair).await;
                    outcome.credit_status = credit.credit_status;
                    outcome.notes.extend(credit.notes);
                    outcome.status =
                        if outcome.credit_status == Some(LegStatus::Success) {
                            RepairStatus::Resolved
                        } else {
                            RepairStatus::InProgress
                        };
                }
                outcome
            }
            CorrectiveAction::ReverseDebit => self.reverse_debit(repair).await,
            CorrectiveAction::ReverseCredit => self.reverse_credit(repair).await,
            CorrectiveAction::ReverseBoth => {
                let mut outcome = self.reverse_debit(repair).await;
                let credit = self.reverse_credit(repair).await;
                outcome.credit_status = credit.credit_status;
                outcome.notes.extend(credit.notes);
                outcome
            }
            CorrectiveAction::ManualDebit => {
                let mut outcome = ActionOutcome::new(RepairStatus::Resolved);
                outcome.debit_status = Some(LegStatus::Success);
                outcome.notes.push(format!("debit completed manually by {}", actor));
                outcome
            }
            CorrectiveAction::ManualCredit => {
                let mut outcome = ActionOutcome::new(RepairStatus::Resolved);
                outcome.credit_status = Some(LegStatus::Success);
                outcome.notes.push(format!("credit completed manually by {}", actor));
                outcome
            }
            CorrectiveAction::ManualBoth => {
                let mut outcome = ActionOutcome::new(RepairStatus::Resolved);
                outcome.debit_status = Some(LegStatus::Success);
                outcome.credit_status = Some(LegStatus::Success);
                outcome.notes.push(format!("both legs completed manually by {}", actor));
                outcome
            }
            CorrectiveAction::CancelTransaction => {
                let mut outcome = ActionOutcome::new(RepairStatus::Cancelled);
                outcome.notes.push(format!("transaction cancelled by {}", actor));
                outcome
            }
            CorrectiveAction::Escalate => {
                let mut outcome = ActionOutcome::new(RepairStatus::Pending);
                outcome.priority = Some(MAX_PRIORITY);
                outcome.notes.push(format!("escalated by {}", actor));
                outcome
            }
            CorrectiveAction::NoAction => {
                let mut outcome = ActionOutcome::new(RepairStatus::Resolved);
                outcome.notes.push(format!("closed with no action by {}", actor));
                outcome
            }
        };

        Ok(outcome)
    }

    async fn retry_debit(&self, repair: &TransactionRepair) -> ActionOutcome {
        let request = DebitRequest {
            transaction_reference: format!("{}-RETRY-DEBIT", repair.transaction_reference),
            tenant_id: repair.tenant_id.clone(),
            account_number: repair.from_account.clone(),
            amount: repair.amount,
            currency: repair.currency.clone(),
            narrative: Some(format!("repair retry of {}", repair.transaction_reference)),
            uetr: None,
        };

        match self.adapter.process_debit(&request).await {
            Ok(response) => {
                let mut outcome = if repair.credit_status == LegStatus::Success {
                    ActionOutcome::new(RepairStatus::Resolved)
                } else {
                    ActionOutcome::new(RepairStatus::InProgress)
                };
                outcome.debit_status = Some(LegStatus::Success);
                outcome.notes.push(format!(
                    "retry debit {} booked as {}",
                    request.transaction_reference, response.transaction_id
                ));
                outcome
            }
            Err(e) => {
                warn!("Retry debit failed for {}: {}", repair.id, e);
                let mut outcome = ActionOutcome::new(RepairStatus::InProgress);
                outcome.debit_status = Some(LegStatus::Failed);
                outcome
                    .notes
                    .push(format!("retry debit {} failed: {}", request.transaction_reference, e));
                outcome
            }
        }
    }

    async fn retry_credit(&self, repair: &TransactionRepair) -> ActionOutcome {
        let request = CreditRequest {
            transaction_reference: format!("{}-RETRY-CREDIT", repair.transaction_reference),
            tenant_id: repair.tenant_id.clone(),
            account_number: repair.to_account.clone(),
            amount: repair.amount,
            currency: repair.currency.clone(),
            narrative: Some(format!("repair retry of {}", repair.transaction_reference)),
            uetr: None,
        };

        match self.adapter.process_credit(&request).await {
            Ok(response) => {
                let mut outcome = if repair.debit_status == LegStatus::Success {
                    ActionOutcome::new(RepairStatus::Resolved)
                } else {
                    ActionOutcome::new(RepairStatus::InProgress)
                };
                outcome.credit_status = Some(LegStatus::Success);
                outcome.notes.push(format!(
                    "retry credit {} booked as {}",
                    request.transaction_reference, response.transaction_id
                ));
                outcome
            }
            Err(e) => {
                warn!("Retry credit failed for {}: {}", repair.id, e);
                let mut outcome = ActionOutcome::new(RepairStatus::InProgress);
                outcome.credit_status = Some(LegStatus::Failed);
                outcome
                    .notes
                    .push(format!("retry credit {} failed: {}", request.transaction_reference, e));
                outcome
            }
        }
    }

    /// Compensate a booked debit by crediting the amount back.
    ///
    /// The repair stays IN_PROGRESS afterwards: reversal completion is
    /// verified by an operator via resolve, never assumed.
    async fn reverse_debit(&self, repair: &TransactionRepair) -> ActionOutcome {
        let request = CreditRequest {
            transaction_reference: format!("{}-REVERSE-DEBIT", repair.transaction_reference),
            tenant_id: repair.tenant_id.clone(),
            account_number: repair.from_account.clone(),
            amount: repair.amount,
            currency: repair.currency.clone(),
            narrative: Some(format!("reversal of {}", repair.transaction_reference)),
            uetr: None,
        };

        let mut outcome = ActionOutcome::new(RepairStatus::InProgress);
        match self.adapter.process_credit(&request).await {
            Ok(response) => {
                outcome.debit_status = Some(LegStatus::Reversed);
                outcome.notes.push(format!(
                    "debit reversal {} submitted as {}, awaiting verification",
                    request.transaction_reference, response.transaction_id
                ));
            }
            Err(e) => {
                outcome
                    .notes
                    .push(format!("debit reversal {} failed: {}", request.transaction_reference, e));
            }
        }
        outcome
    }

    async fn reverse_credit(&self, repair: &TransactionRepair) -> ActionOutcome {
        let request = DebitRequest {
            transaction_reference: format!("{}-REVERSE-CREDIT", repair.transaction_reference),
            tenant_id: repair.tenant_id.clone(),
            account_number: repair.to_account.clone(),
            amount: repair.amount,
            currency: repair.currency.clone(),
            narrative: Some(format!("reversal of {}", repair.transaction_reference)),
            uetr: None,
        };

        let mut outcome = ActionOutcome::new(RepairStatus::InProgress);
        match self.adapter.process_debit(&request).await {
            Ok(response) => {
                outcome.credit_status = Some(LegStatus::Reversed);
                outcome.notes.push(format!(
                    "credit reversal {} submitted as {}, awaiting verification",
                    request.transaction_reference, response.transaction_id
                ));
            }
            Err(e) => {
                outcome
                    .notes
                    .push(format!("credit reversal {} failed: {}", request.transaction_reference, e));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepairType;
    use banking::InternalAdapter;
    use rust_decimal::Decimal;

    fn fixture() -> (RepairActionExecutor, Arc<InternalAdapter>, TransactionRepair) {
        let adapter = Arc::new(InternalAdapter::new("BANK001"));
        adapter.open_account("ACC-100", "Alice", "USD", Decimal::new(500000, 2));
        adapter.open_account("ACC-200", "Bob", "USD", Decimal::new(100000, 2));

        let mut repair = TransactionRepair::new(
            "TXN-1",
            "demo-bank",
            RepairType::CreditFailed,
            "ACC-100",
            "ACC-200",
            Decimal::new(50000, 2),
            "USD",
            5,
        );
        repair.debit_status = LegStatus::Success;
        repair.credit_status = LegStatus::Failed;

        (RepairActionExecutor::new(adapter.clone()), adapter, repair)
    }

    #[tokio::test]
    async fn test_retry_credit_resolves_when_debit_succeeded() {
        let (executor, adapter, repair) = fixture();

        let outcome = executor
            .execute(&repair, CorrectiveAction::RetryCredit, "ops@demo-bank")
            .await
            .unwrap();

        assert_eq!(outcome.status, RepairStatus::Resolved);
        assert_eq!(outcome.credit_status, Some(LegStatus::Success));

        // The retried reference carries the suffix
        assert_eq!(
            adapter
                .get_transaction_status("demo-bank", "TXN-1-RETRY-CREDIT")
                .await
                .unwrap(),
            banking::TransactionStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_retry_debit_business_failure_stays_in_progress() {
        let (executor, adapter, mut repair) = fixture();
        repair.repair_type = RepairType::DebitFailed;
        repair.debit_status = LegStatus::Failed;
        repair.credit_status = LegStatus::NotAttempted;
        repair.amount = Decimal::new(99000000, 2);
        adapter.freeze_account("ACC-100");

        let outcome = executor
            .execute(&repair, CorrectiveAction::RetryDebit, "ops@demo-bank")
            .await
            .unwrap();

        assert_eq!(outcome.status, RepairStatus::InProgress);
        assert_eq!(outcome.debit_status, Some(LegStatus::Failed));
        assert!(outcome.notes[0].contains("failed"));
    }

    #[tokio::test]
    async fn test_reverse_debit_parks_for_verification() {
        let (executor, adapter, repair) = fixture();

        let outcome = executor
            .execute(&repair, CorrectiveAction::ReverseDebit, "ops@demo-bank")
            .await
            .unwrap();

        assert_eq!(outcome.status, RepairStatus::InProgress);
        assert_eq!(outcome.debit_status, Some(LegStatus::Reversed));
        assert!(outcome.notes[0].contains("awaiting verification"));

        // Compensating credit landed back on the debtor account
        assert_eq!(
            adapter.get_account_balance("demo-bank", "ACC-100").await.unwrap(),
            Decimal::new(550000, 2)
        );
    }

    #[tokio::test]
    async fn test_manual_and_terminal_actions() {
        let (executor, _adapter, repair) = fixture();

        let manual = executor
            .execute(&repair, CorrectiveAction::ManualCredit, "ops@demo-bank")
            .await
            .unwrap();
        assert_eq!(manual.status, RepairStatus::Resolved);

        let cancel = executor
            .execute(&repair, CorrectiveAction::CancelTransaction, "ops@demo-bank")
            .await
            .unwrap();
        assert_eq!(cancel.status, RepairStatus::Cancelled);

        let escalate = executor
            .execute(&repair, CorrectiveAction::Escalate, "ops@demo-bank")
            .await
            .unwrap();
        assert_eq!(escalate.status, RepairStatus::Pending);
        assert_eq!(escalate.priority, Some(10));

        let noop = executor
            .execute(&repair, CorrectiveAction::NoAction, "ops@demo-bank")
            .await
            .unwrap();
        assert_eq!(noop.status, RepairStatus::Resolved);
    }

    #[tokio::test]
    async fn test_retry_both_runs_credit_after_debit() {
        let (executor, adapter, mut repair) = fixture();
        repair.repair_type = RepairType::PartialSuccess;
        repair.debit_status = LegStatus::Failed;
        repair.credit_status = LegStatus::Failed;

        let outcome = executor
            .execute(&repair, CorrectiveAction::RetryBoth, "ops@demo-bank")
            .await
            .unwrap();

        assert_eq!(outcome.status, RepairStatus::Resolved);
        assert_eq!(outcome.debit_status, Some(LegStatus::Success));
        assert_eq!(outcome.credit_status, Some(LegStatus::Success));
        assert_eq!(
            adapter
                .get_transaction_status("demo-bank", "TXN-1-RETRY-DEBIT")
                .await
                .unwrap(),
            banking::TransactionStatus::Completed
        );
    }
}
