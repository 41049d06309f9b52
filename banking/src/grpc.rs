//! gRPC core banking adapter
//!
//! The service surface is small enough that the prost messages and the
//! unary client are written by hand instead of taking a protoc build
//! dependency; method paths and codec wiring match what tonic's codegen
//! emits. Amounts travel as decimal strings.
//!
//! The ISO 20022 trio and account-holder lookup are advertised as
//! unsupported on this transport.

use crate::adapter::{Capability, CoreBankingAdapter};
use crate::types::{
    AccountInfo, AccountStatus, AdapterKind, CreditRequest, DebitRequest, HoldRequest,
    TransactionResponse, TransactionStatus, TransferRequest,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tonic::transport::{Channel, Endpoint};

/// Wire messages for the CoreBanking service
pub mod pb {
    /// Account-scoped request
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AccountRequest {
        /// Requesting tenant
        #[prost(string, tag = "1")]
        pub tenant_id: String,
        /// Target account
        #[prost(string, tag = "2")]
        pub account_number: String,
    }

    /// Account details reply
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AccountInfoReply {
        /// Account number
        #[prost(string, tag = "1")]
        pub account_number: String,
        /// Holder name
        #[prost(string, tag = "2")]
        pub account_holder: String,
        /// Owning bank code
        #[prost(string, tag = "3")]
        pub bank_code: String,
        /// ISO 4217 currency
        #[prost(string, tag = "4")]
        pub currency: String,
        /// ACTIVE, CLOSED, or FROZEN
        #[prost(string, tag = "5")]
        pub status: String,
        /// Booked balance as a decimal string
        #[prost(string, tag = "6")]
        pub balance: String,
        /// Available balance as a decimal string
        #[prost(string, tag = "7")]
        pub available_balance: String,
    }

    /// Amount-qualified account request
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FundsRequest {
        /// Requesting tenant
        #[prost(string, tag = "1")]
        pub tenant_id: String,
        /// Target account
        #[prost(string, tag = "2")]
        pub account_number: String,
        /// Amount as a decimal string
        #[prost(string, tag = "3")]
        pub amount: String,
        /// ISO 4217 currency
        #[prost(string, tag = "4")]
        pub currency: String,
    }

    /// Boolean reply
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FlagReply {
        /// The answer
        #[prost(bool, tag = "1")]
        pub value: bool,
    }

    /// Plain text reply
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TextReply {
        /// The answer
        #[prost(string, tag = "1")]
        pub value: String,
    }

    /// Debit/credit/transfer instruction
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TransactionRequest {
        /// Idempotent transaction reference
        #[prost(string, tag = "1")]
        pub transaction_reference: String,
        /// Requesting tenant
        #[prost(string, tag = "2")]
        pub tenant_id: String,
        /// Debtor account (empty for credits)
        #[prost(string, tag = "3")]
        pub from_account: String,
        /// Creditor account (empty for debits)
        #[prost(string, tag = "4")]
        pub to_account: String,
        /// Amount as a decimal string
        #[prost(string, tag = "5")]
        pub amount: String,
        /// ISO 4217 currency
        #[prost(string, tag = "6")]
        pub currency: String,
        /// Statement narrative
        #[prost(string, tag = "7")]
        pub narrative: String,
        /// End-to-end reference
        #[prost(string, tag = "8")]
        pub uetr: String,
    }

    /// Transaction outcome reply
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TransactionReply {
        /// Core-side transaction id
        #[prost(string, tag = "1")]
        pub transaction_id: String,
        /// Echoed transaction reference
        #[prost(string, tag = "2")]
        pub transaction_reference: String,
        /// PENDING, COMPLETED, FAILED, REVERSED, UNKNOWN
        #[prost(string, tag = "3")]
        pub status: String,
        /// Reason for non-completed outcomes
        #[prost(string, tag = "4")]
        pub reason: String,
        /// Processing instant, RFC 3339
        #[prost(string, tag = "5")]
        pub processed_at: String,
    }

    /// Transaction status lookup
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StatusRequest {
        /// Requesting tenant
        #[prost(string, tag = "1")]
        pub tenant_id: String,
        /// Transaction reference to look up
        #[prost(string, tag = "2")]
        pub transaction_reference: String,
    }

    /// Same-bank classification request
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SameBankRequest {
        /// Requesting tenant
        #[prost(string, tag = "1")]
        pub tenant_id: String,
        /// Debtor account
        #[prost(string, tag = "2")]
        pub from_account: String,
        /// Creditor account
        #[prost(string, tag = "3")]
        pub to_account: String,
    }

    /// Clearing/instrument resolution request
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RoutingRequest {
        /// Requesting tenant
        #[prost(string, tag = "1")]
        pub tenant_id: String,
        /// Payment type
        #[prost(string, tag = "2")]
        pub payment_type: String,
        /// Local instrument code
        #[prost(string, tag = "3")]
        pub local_instrument_code: String,
    }

    /// Empty request/reply
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Empty {}
}

/// Thin unary client over one channel
#[derive(Debug, Clone)]
struct CoreBankingClient {
    inner: tonic::client::Grpc<Channel>,
}

impl CoreBankingClient {
    fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    async fn unary<Req, Resp>(
        &mut self,
        message: Req,
        path: &'static str,
    ) -> std::result::Result<Resp, tonic::Status>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("service not ready: {}", e)))?;
        let codec: tonic::codec::ProstCodec<Req, Resp> = tonic::codec::ProstCodec::default();
        let path = tonic::codegen::http::uri::PathAndQuery::from_static(path);
        self.inner
            .unary(tonic::Request::new(message), path, codec)
            .await
            .map(tonic::Response::into_inner)
    }
}

/// gRPC transport for a core banking system
pub struct GrpcAdapter {
    name: String,
    client: CoreBankingClient,
}

impl GrpcAdapter {
    /// Create an adapter; the channel connects lazily on first use
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let endpoint = Endpoint::from_shared(base_url.into())
            .map_err(|e| Error::Internal(format!("invalid gRPC endpoint: {}", e)))?
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(30));
        Ok(Self {
            name: name.into(),
            client: CoreBankingClient::new(endpoint.connect_lazy()),
        })
    }

    fn parse_decimal(raw: &str) -> Result<Decimal> {
        Decimal::from_str(raw)
            .map_err(|e| Error::Serialization(format!("invalid decimal '{}': {}", raw, e)))
    }

    fn parse_account(reply: pb::AccountInfoReply) -> Result<AccountInfo> {
        let status = match reply.status.as_str() {
            "ACTIVE" => AccountStatus::Active,
            "CLOSED" => AccountStatus::Closed,
            "FROZEN" => AccountStatus::Frozen,
            other => {
                return Err(Error::Serialization(format!(
                    "unknown account status '{}'",
                    other
                )))
            }
        };
        Ok(AccountInfo {
            balance: Self::parse_decimal(&reply.balance)?,
            available_balance: Self::parse_decimal(&reply.available_balance)?,
            account_number: reply.account_number,
            account_holder: reply.account_holder,
            bank_code: reply.bank_code,
            currency: reply.currency,
            status,
        })
    }

    fn parse_transaction(reply: pb::TransactionReply) -> Result<TransactionResponse> {
        let status = Self::parse_status(&reply.status)?;
        let processed_at = DateTime::parse_from_rfc3339(&reply.processed_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(TransactionResponse {
            transaction_id: reply.transaction_id,
            transaction_reference: reply.transaction_reference,
            status,
            reason: if reply.reason.is_empty() {
                None
            } else {
                Some(reply.reason)
            },
            processed_at,
        })
    }

    fn parse_status(raw: &str) -> Result<TransactionStatus> {
        Ok(match raw {
            "PENDING" => TransactionStatus::Pending,
            "COMPLETED" => TransactionStatus::Completed,
            "FAILED" => TransactionStatus::Failed,
            "REVERSED" => TransactionStatus::Reversed,
            _ => TransactionStatus::Unknown,
        })
    }
}

fn classify_status(status: tonic::Status) -> Error {
    use tonic::Code;

    let message = status.message().to_string();
    match status.code() {
        Code::Unavailable | Code::Aborted => Error::Connection(message),
        Code::DeadlineExceeded => Error::Timeout(message),
        Code::Unimplemented => Error::NotSupported(message),
        Code::FailedPrecondition | Code::InvalidArgument | Code::NotFound | Code::OutOfRange => {
            // Servers encode business rejections as "CODE: detail"
            match message.split_once(':') {
                Some((code, detail)) if code.chars().all(|c| c.is_ascii_uppercase() || c == '_') => {
                    Error::Business {
                        code: code.to_string(),
                        message: detail.trim().to_string(),
                    }
                }
                _ => Error::Business {
                    code: "CORE_REJECTED".to_string(),
                    message,
                },
            }
        }
        _ => Error::Internal(message),
    }
}

macro_rules! method_path {
    ($name:literal) => {
        concat!("/paygrid.corebanking.v1.CoreBanking/", $name)
    };
}

#[async_trait]
impl CoreBankingAdapter for GrpcAdapter {
    fn adapter_kind(&self) -> AdapterKind {
        AdapterKind::Grpc
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, capability: Capability) -> bool {
        !matches!(
            capability,
            Capability::GetAccountHolder
                | Capability::ProcessIso20022Payment
                | Capability::GenerateIso20022Response
                | Capability::ValidateIso20022Message
        )
    }

    async fn health_check(&self) -> Result<()> {
        let mut client = self.client.clone();
        client
            .unary::<pb::Empty, pb::Empty>(pb::Empty {}, method_path!("HealthCheck"))
            .await
            .map(|_| ())
            .map_err(classify_status)
    }

    async fn get_account_info(&self, tenant_id: &str, account_number: &str) -> Result<AccountInfo> {
        let mut client = self.client.clone();
        let reply: pb::AccountInfoReply = client
            .unary(
                pb::AccountRequest {
                    tenant_id: tenant_id.to_string(),
                    account_number: account_number.to_string(),
                },
                method_path!("GetAccountInfo"),
            )
            .await
            .map_err(classify_status)?;
        Self::parse_account(reply)
    }

    async fn validate_account(&self, tenant_id: &str, account_number: &str) -> Result<bool> {
        let mut client = self.client.clone();
        let reply: pb::FlagReply = client
            .unary(
                pb::AccountRequest {
                    tenant_id: tenant_id.to_string(),
                    account_number: account_number.to_string(),
                },
                method_path!("ValidateAccount"),
            )
            .await
            .map_err(classify_status)?;
        Ok(reply.value)
    }

    async fn get_account_balance(&self, tenant_id: &str, account_number: &str) -> Result<Decimal> {
        let mut client = self.client.clone();
        let reply: pb::TextReply = client
            .unary(
                pb::AccountRequest {
                    tenant_id: tenant_id.to_string(),
                    account_number: account_number.to_string(),
                },
                method_path!("GetAccountBalance"),
            )
            .await
            .map_err(classify_status)?;
        Self::parse_decimal(&reply.value)
    }

    async fn has_sufficient_funds(
        &self,
        tenant_id: &str,
        account_number: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<bool> {
        let mut client = self.client.clone();
        let reply: pb::FlagReply = client
            .unary(
                pb::FundsRequest {
                    tenant_id: tenant_id.to_string(),
                    account_number: account_number.to_string(),
                    amount: amount.to_string(),
                    currency: currency.to_string(),
                },
                method_path!("HasSufficientFunds"),
            )
            .await
            .map_err(classify_status)?;
        Ok(reply.value)
    }

    async fn get_account_holder(&self, _tenant_id: &str, _account_number: &str) -> Result<String> {
        Err(Error::NotSupported(
            Capability::GetAccountHolder.name().to_string(),
        ))
    }

    async fn process_debit(&self, request: &DebitRequest) -> Result<TransactionResponse> {
        let mut client = self.client.clone();
        let reply: pb::TransactionReply = client
            .unary(
                pb::TransactionRequest {
                    transaction_reference: request.transaction_reference.clone(),
                    tenant_id: request.tenant_id.clone(),
                    from_account: request.account_number.clone(),
                    to_account: String::new(),
                    amount: request.amount.to_string(),
                    currency: request.currency.clone(),
                    narrative: request.narrative.clone().unwrap_or_default(),
                    uetr: request.uetr.clone().unwrap_or_default(),
                },
                method_path!("ProcessDebit"),
            )
            .await
            .map_err(classify_status)?;
        Self::parse_transaction(reply)
    }

    async fn process_credit(&self, request: &CreditRequest) -> Result<TransactionResponse> {
        let mut client = self.client.clone();
        let reply: pb::TransactionReply = client
            .unary(
                pb::TransactionRequest {
                    transaction_reference: request.transaction_reference.clone(),
                    tenant_id: request.tenant_id.clone(),
                    from_account: String::new(),
                    to_account: request.account_number.clone(),
                    amount: request.amount.to_string(),
                    currency: request.currency.clone(),
                    narrative: request.narrative.clone().unwrap_or_default(),
                    uetr: request.uetr.clone().unwrap_or_default(),
                },
                method_path!("ProcessCredit"),
            )
            .await
            .map_err(classify_status)?;
        Self::parse_transaction(reply)
    }

    async fn process_transfer(&self, request: &TransferRequest) -> Result<TransactionResponse> {
        let mut client = self.client.clone();
        let reply: pb::TransactionReply = client
            .unary(
                pb::TransactionRequest {
                    transaction_reference: request.transaction_reference.clone(),
                    tenant_id: request.tenant_id.clone(),
                    from_account: request.from_account.clone(),
                    to_account: request.to_account.clone(),
                    amount: request.amount.to_string(),
                    currency: request.currency.clone(),
                    narrative: request.narrative.clone().unwrap_or_default(),
                    uetr: request.uetr.clone().unwrap_or_default(),
                },
                method_path!("ProcessTransfer"),
            )
            .await
            .map_err(classify_status)?;
        Self::parse_transaction(reply)
    }

    async fn hold_funds(&self, request: &HoldRequest) -> Result<TransactionResponse> {
        let mut client = self.client.clone();
        let reply: pb::TransactionReply = client
            .unary(
                pb::FundsRequest {
                    tenant_id: request.tenant_id.clone(),
                    account_number: request.account_number.clone(),
                    amount: request.amount.to_string(),
                    currency: request.currency.clone(),
                },
                method_path!("HoldFunds"),
            )
            .await
            .map_err(classify_status)?;
        Self::parse_transaction(reply)
    }

    async fn release_funds(
        &self,
        tenant_id: &str,
        hold_reference: &str,
    ) -> Result<TransactionResponse> {
        let mut client = self.client.clone();
        let reply: pb::TransactionReply = client
            .unary(
                pb::StatusRequest {
                    tenant_id: tenant_id.to_string(),
                    transaction_reference: hold_reference.to_string(),
                },
                method_path!("ReleaseFunds"),
            )
            .await
            .map_err(classify_status)?;
        Self::parse_transaction(reply)
    }

    async fn get_transaction_status(
        &self,
        tenant_id: &str,
        transaction_reference: &str,
    ) -> Result<TransactionStatus> {
        let mut client = self.client.clone();
        let reply: pb::TextReply = client
            .unary(
                pb::StatusRequest {
                    tenant_id: tenant_id.to_string(),
                    transaction_reference: transaction_reference.to_string(),
                },
                method_path!("GetTransactionStatus"),
            )
            .await
            .map_err(classify_status)?;
        Self::parse_status(&reply.value)
    }

    async fn is_same_bank_payment(
        &self,
        tenant_id: &str,
        from_account: &str,
        to_account: &str,
    ) -> Result<bool> {
        let mut client = self.client.clone();
        let reply: pb::FlagReply = client
            .unary(
                pb::SameBankRequest {
                    tenant_id: tenant_id.to_string(),
                    from_account: from_account.to_string(),
                    to_account: to_account.to_string(),
                },
                method_path!("IsSameBankPayment"),
            )
            .await
            .map_err(classify_status)?;
        Ok(reply.value)
    }

    async fn get_clearing_system_for_payment(
        &self,
        tenant_id: &str,
        payment_type: &str,
        local_instrument_code: &str,
    ) -> Result<String> {
        let mut client = self.client.clone();
        let reply: pb::TextReply = client
            .unary(
                pb::RoutingRequest {
                    tenant_id: tenant_id.to_string(),
                    payment_type: payment_type.to_string(),
                    local_instrument_code: local_instrument_code.to_string(),
                },
                method_path!("GetClearingSystemForPayment"),
            )
            .await
            .map_err(classify_status)?;
        Ok(reply.value)
    }

    async fn get_local_instrumentation_code(
        &self,
        tenant_id: &str,
        payment_type: &str,
    ) -> Result<String> {
        let mut client = self.client.clone();
        let reply: pb::TextReply = client
            .unary(
                pb::RoutingRequest {
                    tenant_id: tenant_id.to_string(),
                    payment_type: payment_type.to_string(),
                    local_instrument_code: String::new(),
                },
                method_path!("GetLocalInstrumentationCode"),
            )
            .await
            .map_err(classify_status)?;
        Ok(reply.value)
    }

    async fn process_iso20022_payment(
        &self,
        _tenant_id: &str,
        _document: &str,
    ) -> Result<TransactionResponse> {
        Err(Error::NotSupported(
            Capability::ProcessIso20022Payment.name().to_string(),
        ))
    }

    async fn generate_iso20022_response(
        &self,
        _tenant_id: &str,
        _original_document: &str,
        _accepted: bool,
    ) -> Result<String> {
        Err(Error::NotSupported(
            Capability::GenerateIso20022Response.name().to_string(),
        ))
    }

    async fn validate_iso20022_message(&self, _tenant_id: &str, _document: &str) -> Result<bool> {
        Err(Error::NotSupported(
            Capability::ValidateIso20022Message.name().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capability_declarations() {
        let adapter = GrpcAdapter::new("core-grpc", "http://127.0.0.1:9090").unwrap();

        assert!(adapter.supports(Capability::ProcessDebit));
        assert!(adapter.supports(Capability::HoldFunds));
        assert!(!adapter.supports(Capability::ProcessIso20022Payment));
        assert!(!adapter.supports(Capability::GetAccountHolder));
    }

    #[test]
    fn test_status_classification() {
        let unavailable = tonic::Status::unavailable("connection refused");
        assert!(matches!(classify_status(unavailable), Error::Connection(_)));

        let deadline = tonic::Status::deadline_exceeded("took too long");
        assert!(matches!(classify_status(deadline), Error::Timeout(_)));

        let business =
            tonic::Status::failed_precondition("INSUFFICIENT_FUNDS: balance below amount");
        match classify_status(business) {
            Error::Business { code, message } => {
                assert_eq!(code, "INSUFFICIENT_FUNDS");
                assert_eq!(message, "balance below amount");
            }
            other => panic!("unexpected classification: {:?}", other),
        }

        let unimplemented = tonic::Status::unimplemented("no such method");
        assert!(matches!(classify_status(unimplemented), Error::NotSupported(_)));
    }

    #[test]
    fn test_service_paths() {
        assert_eq!(
            method_path!("ProcessDebit"),
            "/paygrid.corebanking.v1.CoreBanking/ProcessDebit"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        use resiliency::FailureClass;

        let adapter = GrpcAdapter::new("core-grpc", "http://127.0.0.1:1").unwrap();
        let result = adapter.validate_account("demo-bank", "ACC-1").await;
        match result {
            Err(e) => assert!(e.is_transient() || matches!(e, Error::Internal(_))),
            Ok(_) => panic!("expected a connection failure"),
        }
    }
}
