//! Core banking adapter contract
//!
//! The orchestration core depends only on this trait; REST, gRPC, and
//! INTERNAL transports implement it. Every implementation advertises the
//! capabilities it supports; invoking an unsupported one fails with
//! [`Error::NotSupported`](crate::Error::NotSupported) rather than
//! panicking or hanging.

use crate::types::{
    AccountInfo, AdapterKind, CreditRequest, DebitRequest, HoldRequest, TransactionResponse,
    TransactionStatus, TransferRequest,
};
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Operations a core banking adapter may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// Fetch account details
    GetAccountInfo,
    /// Check an account exists and is transactable
    ValidateAccount,
    /// Fetch the booked balance
    GetAccountBalance,
    /// Check available funds cover an amount
    HasSufficientFunds,
    /// Fetch the account holder name
    GetAccountHolder,
    /// Post a debit
    ProcessDebit,
    /// Post a credit
    ProcessCredit,
    /// Post a two-leg book transfer
    ProcessTransfer,
    /// Reserve funds
    HoldFunds,
    /// Release a reservation
    ReleaseFunds,
    /// Poll a transaction's status
    GetTransactionStatus,
    /// Decide whether two accounts share a bank
    IsSameBankPayment,
    /// Resolve the clearing system for a payment
    GetClearingSystemForPayment,
    /// Resolve the default local instrument for a payment type
    GetLocalInstrumentationCode,
    /// Accept a full ISO 20022 payment document
    ProcessIso20022Payment,
    /// Produce a pacs.002 status report
    GenerateIso20022Response,
    /// Structurally validate an ISO 20022 document
    ValidateIso20022Message,
}

impl Capability {
    /// Operation name used in `NotSupported` errors
    pub fn name(&self) -> &'static str {
        match self {
            Capability::GetAccountInfo => "getAccountInfo",
            Capability::ValidateAccount => "validateAccount",
            Capability::GetAccountBalance => "getAccountBalance",
            Capability::HasSufficientFunds => "hasSufficientFunds",
            Capability::GetAccountHolder => "getAccountHolder",
            Capability::ProcessDebit => "processDebit",
            Capability::ProcessCredit => "processCredit",
            Capability::ProcessTransfer => "processTransfer",
            Capability::HoldFunds => "holdFunds",
            Capability::ReleaseFunds => "releaseFunds",
            Capability::GetTransactionStatus => "getTransactionStatus",
            Capability::IsSameBankPayment => "isSameBankPayment",
            Capability::GetClearingSystemForPayment => "getClearingSystemForPayment",
            Capability::GetLocalInstrumentationCode => "getLocalInstrumentationCode",
            Capability::ProcessIso20022Payment => "processIso20022Payment",
            Capability::GenerateIso20022Response => "generateIso20022Response",
            Capability::ValidateIso20022Message => "validateIso20022Message",
        }
    }
}

/// Core banking adapter contract
#[async_trait]
pub trait CoreBankingAdapter: Send + Sync {
    /// Transport flavor
    fn adapter_kind(&self) -> AdapterKind;

    /// Adapter instance name for logs and metrics
    fn name(&self) -> &str;

    /// Whether this adapter implements a capability
    fn supports(&self, capability: Capability) -> bool;

    /// Probe the downstream
    async fn health_check(&self) -> Result<()>;

    // Account operations

    /// Fetch account details
    async fn get_account_info(&self, tenant_id: &str, account_number: &str) -> Result<AccountInfo>;

    /// Check an account exists and is transactable
    async fn validate_account(&self, tenant_id: &str, account_number: &str) -> Result<bool>;

    /// Fetch the booked balance
    async fn get_account_balance(&self, tenant_id: &str, account_number: &str) -> Result<Decimal>;

    /// Check available funds cover an amount
    async fn has_sufficient_funds(
        &self,
        tenant_id: &str,
        account_number: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<bool>;

    /// Fetch the account holder name
    async fn get_account_holder(&self, tenant_id: &str, account_number: &str) -> Result<String>;

    // Transaction operations

    /// Post a debit
    async fn process_debit(&self, request: &DebitRequest) -> Result<TransactionResponse>;

    /// Post a credit
    async fn process_credit(&self, request: &CreditRequest) -> Result<TransactionResponse>;

    /// Post a two-leg book transfer
    async fn process_transfer(&self, request: &TransferRequest) -> Result<TransactionResponse>;

    /// Reserve funds
    async fn hold_funds(&self, request: &HoldRequest) -> Result<TransactionResponse>;

    /// Release a reservation
    async fn release_funds(
        &self,
        tenant_id: &str,
        hold_reference: &str,
    ) -> Result<TransactionResponse>;

    /// Poll a transaction's status
    async fn get_transaction_status(
        &self,
        tenant_id: &str,
        transaction_reference: &str,
    ) -> Result<TransactionStatus>;

    // Routing helpers

    /// Whether both accounts belong to this adapter's bank
    async fn is_same_bank_payment(
        &self,
        tenant_id: &str,
        from_account: &str,
        to_account: &str,
    ) -> Result<bool>;

    /// Clearing system code the core prefers for a payment
    async fn get_clearing_system_for_payment(
        &self,
        tenant_id: &str,
        payment_type: &str,
        local_instrument_code: &str,
    ) -> Result<String>;

    /// Default local instrument code for a payment type
    async fn get_local_instrumentation_code(
        &self,
        tenant_id: &str,
        payment_type: &str,
    ) -> Result<String>;

    // ISO 20022 operations

    /// Accept a full ISO 20022 payment document (pacs.008)
    async fn process_iso20022_payment(
        &self,
        tenant_id: &str,
        document: &str,
    ) -> Result<TransactionResponse>;

    /// Produce a pacs.002 status report for an inbound document
    async fn generate_iso20022_response(
        &self,
        tenant_id: &str,
        original_document: &str,
        accepted: bool,
    ) -> Result<String>;

    /// Structurally validate an ISO 20022 document
    async fn validate_iso20022_message(&self, tenant_id: &str, document: &str) -> Result<bool>;
}
