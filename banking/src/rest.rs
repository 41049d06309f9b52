//! REST core banking adapter
//!
//! Stateless JSON-over-HTTP transport. Every call carries `X-Tenant-ID`
//! and a generated `X-Request-ID`; the adapter keeps no per-call state so
//! retries from the resiliency envelope are safe. Funds holds and ISO
//! response generation are advertised as unsupported.

use crate::adapter::{Capability, CoreBankingAdapter};
use crate::types::{
    AccountInfo, AdapterKind, AuthMethod, CreditRequest, DebitRequest, HoldRequest,
    TransactionResponse, TransactionStatus, TransferRequest,
};
use crate::{Error, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Header carrying the tenant
pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Error body shape returned by core banking REST APIs
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceBody {
    balance: Decimal,
}

#[derive(Debug, Deserialize)]
struct FlagBody {
    result: bool,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    value: String,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: TransactionStatus,
}

/// REST transport for a core banking system
pub struct RestAdapter {
    name: String,
    base_url: String,
    client: reqwest::Client,
    auth_method: AuthMethod,
    api_key: Option<String>,
}

impl RestAdapter {
    /// Create an adapter against a base URL
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        timeout_ms: u64,
        auth_method: AuthMethod,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Internal(format!("http client build failed: {}", e)))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            auth_method,
            api_key,
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        tenant_id: &str,
    ) -> reqwest::RequestBuilder {
        let request_id = Uuid::new_v4().to_string();
        debug!("{} {}{} [{}]", method, self.base_url, path, request_id);

        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(TENANT_HEADER, tenant_id)
            .header(REQUEST_ID_HEADER, request_id);

        if self.auth_method == AuthMethod::ApiKey {
            if let Some(ref key) = self.api_key {
                builder = builder.header("X-API-Key", key.as_str());
            }
        }
        builder
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = builder.send().await.map_err(classify_reqwest)?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| Error::Serialization(format!("response decode failed: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();

        if status.is_server_error() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        // 4xx: the core answered; surface a business rejection when the
        // body carries a code, otherwise report the raw status
        match serde_json::from_str::<RestErrorBody>(&body) {
            Ok(RestErrorBody {
                code: Some(code),
                message,
            }) => Err(Error::Business {
                code,
                message: message.unwrap_or_else(|| status.to_string()),
            }),
            _ => Err(Error::Http {
                status: status.as_u16(),
                message: body,
            }),
        }
    }
}

fn classify_reqwest(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout(error.to_string())
    } else if error.is_connect() {
        Error::Connection(error.to_string())
    } else {
        Error::Connection(error.to_string())
    }
}

#[async_trait]
impl CoreBankingAdapter for RestAdapter {
    fn adapter_kind(&self) -> AdapterKind {
        AdapterKind::Rest
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, capability: Capability) -> bool {
        !matches!(
            capability,
            Capability::HoldFunds | Capability::ReleaseFunds | Capability::GenerateIso20022Response
        )
    }

    async fn health_check(&self) -> Result<()> {
        let builder = self.request(reqwest::Method::GET, "/health", "system");
        let response = builder.send().await.map_err(classify_reqwest)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Http {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }

    async fn get_account_info(&self, tenant_id: &str, account_number: &str) -> Result<AccountInfo> {
        self.send(self.request(
            reqwest::Method::GET,
            &format!("/accounts/{}", account_number),
            tenant_id,
        ))
        .await
    }

    async fn validate_account(&self, tenant_id: &str, account_number: &str) -> Result<bool> {
        let body: FlagBody = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/accounts/{}/validate", account_number),
                tenant_id,
            ))
            .await?;
        Ok(body.result)
    }

    async fn get_account_balance(&self, tenant_id: &str, account_number: &str) -> Result<Decimal> {
        let body: BalanceBody = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/accounts/{}/balance", account_number),
                tenant_id,
            ))
            .await?;
        Ok(body.balance)
    }

    async fn has_sufficient_funds(
        &self,
        tenant_id: &str,
        account_number: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<bool> {
        let body: FlagBody = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/accounts/{}/sufficient-funds", account_number),
                    tenant_id,
                )
                .json(&serde_json::json!({"amount": amount, "currency": currency})),
            )
            .await?;
        Ok(body.result)
    }

    async fn get_account_holder(&self, tenant_id: &str, account_number: &str) -> Result<String> {
        let body: TextBody = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/accounts/{}/holder", account_number),
                tenant_id,
            ))
            .await?;
        Ok(body.value)
    }

    async fn process_debit(&self, request: &DebitRequest) -> Result<TransactionResponse> {
        self.send(
            self.request(reqwest::Method::POST, "/transactions/debit", &request.tenant_id)
                .json(request),
        )
        .await
    }

    async fn process_credit(&self, request: &CreditRequest) -> Result<TransactionResponse> {
        self.send(
            self.request(reqwest::Method::POST, "/transactions/credit", &request.tenant_id)
                .json(request),
        )
        .await
    }

    async fn process_transfer(&self, request: &TransferRequest) -> Result<TransactionResponse> {
        self.send(
            self.request(reqwest::Method::POST, "/transactions/transfer", &request.tenant_id)
                .json(request),
        )
        .await
    }

    async fn hold_funds(&self, _request: &HoldRequest) -> Result<TransactionResponse> {
        Err(Error::NotSupported(Capability::HoldFunds.name().to_string()))
    }

    async fn release_funds(
        &self,
        _tenant_id: &str,
        _hold_reference: &str,
    ) -> Result<TransactionResponse> {
        Err(Error::NotSupported(Capability::ReleaseFunds.name().to_string()))
    }

    async fn get_transaction_status(
        &self,
        tenant_id: &str,
        transaction_reference: &str,
    ) -> Result<TransactionStatus> {
        let body: StatusBody = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/transactions/{}/status", transaction_reference),
                tenant_id,
            ))
            .await?;
        Ok(body.status)
    }

    async fn is_same_bank_payment(
        &self,
        tenant_id: &str,
        from_account: &str,
        to_account: &str,
    ) -> Result<bool> {
        let body: FlagBody = self
            .send(
                self.request(reqwest::Method::POST, "/routing/same-bank", tenant_id).json(
                    &serde_json::json!({"fromAccount": from_account, "toAccount": to_account}),
                ),
            )
            .await?;
        Ok(body.result)
    }

    async fn get_clearing_system_for_payment(
        &self,
        tenant_id: &str,
        payment_type: &str,
        local_instrument_code: &str,
    ) -> Result<String> {
        let body: TextBody = self
            .send(
                self.request(reqwest::Method::POST, "/routing/clearing-system", tenant_id)
                    .json(&serde_json::json!({
                        "paymentType": payment_type,
                        "localInstrumentCode": local_instrument_code,
                    })),
            )
            .await?;
        Ok(body.value)
    }

    async fn get_local_instrumentation_code(
        &self,
        tenant_id: &str,
        payment_type: &str,
    ) -> Result<String> {
        let body: TextBody = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/routing/local-instrument/{}", payment_type),
                tenant_id,
            ))
            .await?;
        Ok(body.value)
    }

    async fn process_iso20022_payment(
        &self,
        tenant_id: &str,
        document: &str,
    ) -> Result<TransactionResponse> {
        self.send(
            self.request(reqwest::Method::POST, "/iso20022/payments", tenant_id)
                .header(reqwest::header::CONTENT_TYPE, "application/xml")
                .body(document.to_string()),
        )
        .await
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

    async fn validate_iso20022_message(&self, tenant_id: &str, document: &str) -> Result<bool> {
        let body: FlagBody = self
            .send(
                self.request(reqwest::Method::POST, "/iso20022/validate", tenant_id)
                    .header(reqwest::header::CONTENT_TYPE, "application/xml")
                    .body(document.to_string()),
            )
            .await?;
        Ok(body.result)
    }
}
