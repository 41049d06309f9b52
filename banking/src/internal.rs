//! INTERNAL core banking adapter
//!
//! An in-process core with real balance arithmetic: accounts, holds, and a
//! transaction journal keyed by reference. Supports every capability and
//! backs demos and the orchestration test suite.

use crate::adapter::{Capability, CoreBankingAdapter};
use crate::iso20022::Iso20022Codec;
use crate::types::{
    AccountInfo, AccountStatus, AdapterKind, CreditRequest, DebitRequest, HoldRequest,
    TransactionResponse, TransactionStatus, TransferRequest,
};
use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

struct AccountState {
    info: AccountInfo,
    /// Active holds by reference
    holds: HashMap<String, Decimal>,
}

impl AccountState {
    fn available(&self) -> Decimal {
        let held: Decimal = self.holds.values().copied().sum();
        self.info.balance - held
    }
}

/// In-process core banking adapter for one bank
pub struct InternalAdapter {
    bank_code: String,
    accounts: DashMap<String, Mutex<AccountState>>,
    transactions: DashMap<String, TransactionResponse>,
    codec: Iso20022Codec,
    /// payment_type -> default local instrument
    local_instruments: DashMap<String, String>,
    /// payment_type -> preferred clearing system
    clearing_preferences: DashMap<String, String>,
}

impl InternalAdapter {
    /// Create an empty internal core for a bank
    pub fn new(bank_code: impl Into<String>) -> Self {
        let bank_code = bank_code.into();
        let adapter = Self {
            codec: Iso20022Codec::new(format!("{}XXX", bank_code.chars().take(8).collect::<String>())),
            bank_code,
            accounts: DashMap::new(),
            transactions: DashMap::new(),
            local_instruments: DashMap::new(),
            clearing_preferences: DashMap::new(),
        };

        adapter.local_instruments.insert("WIRE_DOMESTIC".to_string(), "WIRE".to_string());
        adapter.local_instruments.insert("ACH_CREDIT".to_string(), "CCD".to_string());
        adapter.local_instruments.insert("RTP".to_string(), "RTP".to_string());
        adapter.clearing_preferences.insert("ACH_CREDIT".to_string(), "ACH".to_string());
        adapter.clearing_preferences.insert("WIRE_INTERNATIONAL".to_string(), "FEDWIRE".to_string());
        adapter.clearing_preferences.insert("RTP".to_string(), "RTP".to_string());
        adapter
    }

    /// Open an account with an initial balance
    pub fn open_account(
        &self,
        account_number: impl Into<String>,
        account_holder: impl Into<String>,
        currency: impl Into<String>,
        balance: Decimal,
    ) {
        let account_number = account_number.into();
        let info = AccountInfo {
            account_number: account_number.clone(),
            account_holder: account_holder.into(),
            bank_code: self.bank_code.clone(),
            currency: currency.into(),
            status: AccountStatus::Active,
            balance,
            available_balance: balance,
        };
        self.accounts
            .insert(account_number, Mutex::new(AccountState {
                info,
                holds: HashMap::new(),
            }));
    }

    /// Mark an account closed
    pub fn close_account(&self, account_number: &str) {
        if let Some(account) = self.accounts.get(account_number) {
            account.lock().info.status = AccountStatus::Closed;
        }
    }

    /// Mark an account frozen
    pub fn freeze_account(&self, account_number: &str) {
        if let Some(account) = self.accounts.get(account_number) {
            account.lock().info.status = AccountStatus::Frozen;
        }
    }

    fn with_account<T>(
        &self,
        account_number: &str,
        f: impl FnOnce(&mut AccountState) -> Result<T>,
    ) -> Result<T> {
        let account = self
            .accounts
            .get(account_number)
            .ok_or_else(|| Error::account_not_found(account_number))?;
        let mut state = account.lock();
        f(&mut state)
    }

    fn ensure_transactable(state: &AccountState, debiting: bool) -> Result<()> {
        match state.info.status {
            AccountStatus::Active => Ok(()),
            AccountStatus::Closed => Err(Error::account_closed(&state.info.account_number)),
            AccountStatus::Frozen if debiting => {
                Err(Error::account_frozen(&state.info.account_number))
            }
            AccountStatus::Frozen => Ok(()),
        }
    }

    fn record(&self, response: TransactionResponse) -> TransactionResponse {
        self.transactions
            .insert(response.transaction_reference.clone(), response.clone());
        response
    }
}

#[async_trait]
impl CoreBankingAdapter for InternalAdapter {
    fn adapter_kind(&self) -> AdapterKind {
        AdapterKind::Internal
    }

    fn name(&self) -> &str {
        &self.bank_code
    }

    fn supports(&self, _capability: Capability) -> bool {
        true
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn get_account_info(&self, _tenant_id: &str, account_number: &str) -> Result<AccountInfo> {
        self.with_account(account_number, |state| {
            let mut info = state.info.clone();
            info.available_balance = state.available();
            Ok(info)
        })
    }

    async fn validate_account(&self, _tenant_id: &str, account_number: &str) -> Result<bool> {
        Ok(self
            .accounts
            .get(account_number)
            .map(|a| a.lock().info.status == AccountStatus::Active)
            .unwrap_or(false))
    }

    async fn get_account_balance(&self, _tenant_id: &str, account_number: &str) -> Result<Decimal> {
        self.with_account(account_number, |state| Ok(state.info.balance))
    }

    async fn has_sufficient_funds(
        &self,
        _tenant_id: &str,
        account_number: &str,
        amount: Decimal,
        _currency: &str,
    ) -> Result<bool> {
        self.with_account(account_number, |state| Ok(state.available() >= amount))
    }

    async fn get_account_holder(&self, _tenant_id: &str, account_number: &str) -> Result<String> {
        self.with_account(account_number, |state| Ok(state.info.account_holder.clone()))
    }

    async fn process_debit(&self, request: &DebitRequest) -> Result<TransactionResponse> {
        // Idempotent on transaction reference
        if let Some(existing) = self.transactions.get(&request.transaction_reference) {
            debug!(
                "Debit {} replayed, returning recorded outcome",
                request.transaction_reference
            );
            return Ok(existing.clone());
        }

        self.with_account(&request.account_number, |state| {
            Self::ensure_transactable(state, true)?;
            if state.available() < request.amount {
                return Err(Error::insufficient_funds(&request.account_number));
            }
            state.info.balance -= request.amount;
            state.info.available_balance = state.available();
            Ok(())
        })?;

        info!(
            "Debited {} {} from {} ({})",
            request.amount, request.currency, request.account_number, request.transaction_reference
        );
        Ok(self.record(TransactionResponse::completed(&request.transaction_reference)))
    }

    async fn process_credit(&self, request: &CreditRequest) -> Result<TransactionResponse> {
        if let Some(existing) = self.transactions.get(&request.transaction_reference) {
            debug!(
                "Credit {} replayed, returning recorded outcome",
                request.transaction_reference
            );
            return Ok(existing.clone());
        }

        self.with_account(&request.account_number, |state| {
            Self::ensure_transactable(state, false)?;
            state.info.balance += request.amount;
            state.info.available_balance = state.available();
            Ok(())
        })?;

        info!(
            "Credited {} {} to {} ({})",
            request.amount, request.currency, request.account_number, request.transaction_reference
        );
        Ok(self.record(TransactionResponse::completed(&request.transaction_reference)))
    }

    async fn process_transfer(&self, request: &TransferRequest) -> Result<TransactionResponse> {
        if let Some(existing) = self.transactions.get(&request.transaction_reference) {
            return Ok(existing.clone());
        }

        let debit = DebitRequest {
            transaction_reference: format!("{}-D", request.transaction_reference),
            tenant_id: request.tenant_id.clone(),
            account_number: request.from_account.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            narrative: request.narrative.clone(),
            uetr: request.uetr.clone(),
        };
        self.process_debit(&debit).await?;

        let credit = CreditRequest {
            transaction_reference: format!("{}-C", request.transaction_reference),
            tenant_id: request.tenant_id.clone(),
            account_number: request.to_account.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            narrative: request.narrative.clone(),
            uetr: request.uetr.clone(),
        };
        self.process_credit(&credit).await?;

        Ok(self.record(TransactionResponse::completed(&request.transaction_reference)))
    }

    async fn hold_funds(&self, request: &HoldRequest) -> Result<TransactionResponse> {
        self.with_account(&request.account_number, |state| {
            Self::ensure_transactable(state, true)?;
            if state.available() < request.amount {
                return Err(Error::insufficient_funds(&request.account_number));
            }
            state
                .holds
                .insert(request.transaction_reference.clone(), request.amount);
            state.info.available_balance = state.available();
            Ok(())
        })?;

        Ok(self.record(TransactionResponse::completed(&request.transaction_reference)))
    }

    async fn release_funds(
        &self,
        _tenant_id: &str,
        hold_reference: &str,
    ) -> Result<TransactionResponse> {
        let mut released = false;
        for account in self.accounts.iter() {
            let mut state = account.lock();
            if state.holds.remove(hold_reference).is_some() {
                state.info.available_balance = state.available();
                released = true;
                break;
            }
        }

        if !released {
            return Err(Error::Business {
                code: "HOLD_NOT_FOUND".to_string(),
                message: format!("no active hold {}", hold_reference),
            });
        }
        Ok(TransactionResponse::completed(hold_reference))
    }

    async fn get_transaction_status(
        &self,
        _tenant_id: &str,
        transaction_reference: &str,
    ) -> Result<TransactionStatus> {
        Ok(self
            .transactions
            .get(transaction_reference)
            .map(|t| t.status)
            .unwrap_or(TransactionStatus::Unknown))
    }

    async fn is_same_bank_payment(
        &self,
        _tenant_id: &str,
        from_account: &str,
        to_account: &str,
    ) -> Result<bool> {
        Ok(self.accounts.contains_key(from_account) && self.accounts.contains_key(to_account))
    }

    async fn get_clearing_system_for_payment(
        &self,
        _tenant_id: &str,
        payment_type: &str,
        _local_instrument_code: &str,
    ) -> Result<String> {
        self.clearing_preferences
            .get(payment_type)
            .map(|c| c.clone())
            .ok_or_else(|| Error::Business {
                code: "NO_CLEARING_PREFERENCE".to_string(),
                message: format!("no clearing preference for {}", payment_type),
            })
    }

    async fn get_local_instrumentation_code(
        &self,
        _tenant_id: &str,
        payment_type: &str,
    ) -> Result<String> {
        Ok(self
            .local_instruments
            .get(payment_type)
            .map(|c| c.clone())
            .unwrap_or_else(|| "WIRE".to_string()))
    }

    async fn process_iso20022_payment(
        &self,
        tenant_id: &str,
        document: &str,
    ) -> Result<TransactionResponse> {
        let parsed = self.codec.validate_pacs008(document)?;
        let tx = &parsed.fi_to_fi_cstmr_cdt_trf.cdt_trf_tx_inf;

        let transfer = TransferRequest {
            transaction_reference: tx.pmt_id.end_to_end_id.clone(),
            tenant_id: tenant_id.to_string(),
            from_account: tx.dbtr.nm.clone(),
            to_account: tx.cdtr.nm.clone(),
            amount: tx.intr_bk_sttlm_amt.value,
            currency: tx.intr_bk_sttlm_amt.ccy.clone(),
            narrative: None,
            uetr: tx.pmt_id.uetr.clone(),
        };
        self.process_transfer(&transfer).await
    }

    async fn generate_iso20022_response(
        &self,
        _tenant_id: &str,
        original_document: &str,
        accepted: bool,
    ) -> Result<String> {
        let original = self.codec.validate_pacs008(original_document)?;
        self.codec.build_pacs002(
            &original,
            accepted,
            if accepted { None } else { Some("rejected by core") },
        )
    }

    async fn validate_iso20022_message(&self, _tenant_id: &str, document: &str) -> Result<bool> {
        Ok(self.codec.validate_pacs008(document).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> InternalAdapter {
        let adapter = InternalAdapter::new("BANK001");
        adapter.open_account("ACC-100", "Alice Smith", "USD", Decimal::new(500000, 2));
        adapter.open_account("ACC-200", "Bob Jones", "USD", Decimal::new(100000, 2));
        adapter
    }

    fn debit(reference: &str, account: &str, amount: Decimal) -> DebitRequest {
        DebitRequest {
            transaction_reference: reference.to_string(),
            tenant_id: "demo-bank".to_string(),
            account_number: account.to_string(),
            amount,
            currency: "USD".to_string(),
            narrative: None,
            uetr: None,
        }
    }

    #[tokio::test]
    async fn test_debit_and_credit_move_balances() {
        let adapter = bank();

        adapter
            .process_debit(&debit("TXN-1", "ACC-100", Decimal::new(100000, 2)))
            .await
            .unwrap();
        assert_eq!(
            adapter.get_account_balance("demo-bank", "ACC-100").await.unwrap(),
            Decimal::new(400000, 2)
        );

        let credit = CreditRequest {
            transaction_reference: "TXN-2".to_string(),
            tenant_id: "demo-bank".to_string(),
            account_number: "ACC-200".to_string(),
            amount: Decimal::new(100000, 2),
            currency: "USD".to_string(),
            narrative: None,
            uetr: None,
        };
        adapter.process_credit(&credit).await.unwrap();
        assert_eq!(
            adapter.get_account_balance("demo-bank", "ACC-200").await.unwrap(),
            Decimal::new(200000, 2)
        );
    }

    #[tokio::test]
    async fn test_debit_is_idempotent_on_reference() {
        let adapter = bank();
        let request = debit("TXN-1", "ACC-100", Decimal::new(100000, 2));

        let first = adapter.process_debit(&request).await.unwrap();
        let second = adapter.process_debit(&request).await.unwrap();

        assert_eq!(first.transaction_id, second.transaction_id);
        // Only one debit was booked
        assert_eq!(
            adapter.get_account_balance("demo-bank", "ACC-100").await.unwrap(),
            Decimal::new(400000, 2)
        );
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_business() {
        let adapter = bank();
        let result = adapter
            .process_debit(&debit("TXN-1", "ACC-200", Decimal::new(900000, 2)))
            .await;

        assert!(matches!(result, Err(Error::Business { ref code, .. })
            if code == crate::error::business_codes::INSUFFICIENT_FUNDS));
    }

    #[tokio::test]
    async fn test_closed_and_frozen_accounts() {
        let adapter = bank();

        adapter.freeze_account("ACC-100");
        let result = adapter
            .process_debit(&debit("TXN-1", "ACC-100", Decimal::ONE))
            .await;
        assert!(matches!(result, Err(Error::Business { ref code, .. })
            if code == crate::error::business_codes::ACCOUNT_FROZEN));

        // Credits to a frozen account still land
        let credit = CreditRequest {
            transaction_reference: "TXN-2".to_string(),
            tenant_id: "demo-bank".to_string(),
            account_number: "ACC-100".to_string(),
            amount: Decimal::ONE,
            currency: "USD".to_string(),
            narrative: None,
            uetr: None,
        };
        assert!(adapter.process_credit(&credit).await.is_ok());

        adapter.close_account("ACC-200");
        let credit_closed = CreditRequest {
            account_number: "ACC-200".to_string(),
            transaction_reference: "TXN-3".to_string(),
            ..credit
        };
        assert!(matches!(
            adapter.process_credit(&credit_closed).await,
            Err(Error::Business { ref code, .. })
                if code == crate::error::business_codes::ACCOUNT_CLOSED
        ));
    }

    #[tokio::test]
    async fn test_holds_reduce_available_funds() {
        let adapter = bank();

        let hold = HoldRequest {
            transaction_reference: "HOLD-1".to_string(),
            tenant_id: "demo-bank".to_string(),
            account_number: "ACC-100".to_string(),
            amount: Decimal::new(450000, 2),
            currency: "USD".to_string(),
        };
        adapter.hold_funds(&hold).await.unwrap();

        assert!(!adapter
            .has_sufficient_funds("demo-bank", "ACC-100", Decimal::new(100000, 2), "USD")
            .await
            .unwrap());

        adapter.release_funds("demo-bank", "HOLD-1").await.unwrap();
        assert!(adapter
            .has_sufficient_funds("demo-bank", "ACC-100", Decimal::new(100000, 2), "USD")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_same_bank_detection() {
        let adapter = bank();
        assert!(adapter
            .is_same_bank_payment("demo-bank", "ACC-100", "ACC-200")
            .await
            .unwrap());
        assert!(!adapter
            .is_same_bank_payment("demo-bank", "ACC-100", "ELSEWHERE-1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_transaction_status_lookup() {
        let adapter = bank();
        adapter
            .process_debit(&debit("TXN-1", "ACC-100", Decimal::ONE))
            .await
            .unwrap();

        assert_eq!(
            adapter.get_transaction_status("demo-bank", "TXN-1").await.unwrap(),
            TransactionStatus::Completed
        );
        assert_eq!(
            adapter.get_transaction_status("demo-bank", "TXN-404").await.unwrap(),
            TransactionStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_iso20022_flow() {
        let adapter = bank();
        let codec = Iso20022Codec::new("BANK001XXX");
        let transfer = TransferRequest {
            transaction_reference: "TXN-ISO-1".to_string(),
            tenant_id: "demo-bank".to_string(),
            from_account: "ACC-100".to_string(),
            to_account: "ACC-200".to_string(),
            amount: Decimal::new(50000, 2),
            currency: "USD".to_string(),
            narrative: None,
            uetr: None,
        };
        let xml = codec.build_pacs008(&transfer, "BANK001XX", "BANK001XX").unwrap();

        assert!(adapter.validate_iso20022_message("demo-bank", &xml).await.unwrap());

        let response = adapter.process_iso20022_payment("demo-bank", &xml).await.unwrap();
        assert_eq!(response.status, TransactionStatus::Completed);

        let pacs002 = adapter
            .generate_iso20022_response("demo-bank", &xml, true)
            .await
            .unwrap();
        assert!(pacs002.contains("ACSP"));
    }
}
