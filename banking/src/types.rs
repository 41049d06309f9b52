//! Core banking request/response types and adapter configuration

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transport flavor of a core banking adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterKind {
    /// JSON over HTTP
    Rest,
    /// gRPC
    Grpc,
    /// In-process core (embedded ledgers, tests, demos)
    Internal,
}

/// How a payment is dispatched to the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingMode {
    /// Wait for the adapter response
    Sync,
    /// Acknowledge now, complete on callback or poll
    Async,
    /// Group and dispatch on a cadence
    Batch,
}

/// Wire format for adapter payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageFormat {
    /// JSON payloads
    Json,
    /// ISO 20022 XML payloads
    Xml,
}

/// Authentication method towards the downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Static API key header
    ApiKey,
    /// HTTP basic auth
    BasicAuth,
    /// OAuth2 bearer token
    Oauth2,
    /// Mutual TLS
    MutualTls,
}

/// Account status at the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    /// Open and transactable
    Active,
    /// Closed; all operations rejected
    Closed,
    /// Frozen; debits rejected
    Frozen,
}

/// Account details returned by the core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account number
    pub account_number: String,

    /// Account holder name
    pub account_holder: String,

    /// Owning bank code
    pub bank_code: String,

    /// Account currency (ISO 4217)
    pub currency: String,

    /// Account status
    pub status: AccountStatus,

    /// Booked balance
    pub balance: Decimal,

    /// Balance minus active holds
    pub available_balance: Decimal,
}

/// Transaction status at the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Accepted, not yet booked
    Pending,
    /// Booked
    Completed,
    /// Rejected or errored
    Failed,
    /// Compensated by a reversal
    Reversed,
    /// Reference not known to the core
    Unknown,
}

/// Single-leg debit instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitRequest {
    /// Idempotent transaction reference
    pub transaction_reference: String,

    /// Requesting tenant
    pub tenant_id: String,

    /// Account to debit
    pub account_number: String,

    /// Amount
    pub amount: Decimal,

    /// Currency (ISO 4217)
    pub currency: String,

    /// Statement narrative
    pub narrative: Option<String>,

    /// End-to-end reference carried across systems
    pub uetr: Option<String>,
}

/// Single-leg credit instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    /// Idempotent transaction reference
    pub transaction_reference: String,

    /// Requesting tenant
    pub tenant_id: String,

    /// Account to credit
    pub account_number: String,

    /// Amount
    pub amount: Decimal,

    /// Currency (ISO 4217)
    pub currency: String,

    /// Statement narrative
    pub narrative: Option<String>,

    /// End-to-end reference carried across systems
    pub uetr: Option<String>,
}

/// Two-leg book transfer instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Idempotent transaction reference
    pub transaction_reference: String,

    /// Requesting tenant
    pub tenant_id: String,

    /// Debtor account
    pub from_account: String,

    /// Creditor account
    pub to_account: String,

    /// Amount
    pub amount: Decimal,

    /// Currency (ISO 4217)
    pub currency: String,

    /// Statement narrative
    pub narrative: Option<String>,

    /// End-to-end reference carried across systems
    pub uetr: Option<String>,
}

/// Funds hold instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldRequest {
    /// Idempotent transaction reference
    pub transaction_reference: String,

    /// Requesting tenant
    pub tenant_id: String,

    /// Account to hold against
    pub account_number: String,

    /// Amount to reserve
    pub amount: Decimal,

    /// Currency (ISO 4217)
    pub currency: String,
}

/// Adapter response for transaction operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// Core-side transaction id
    pub transaction_id: String,

    /// Echoed transaction reference
    pub transaction_reference: String,

    /// Outcome
    pub status: TransactionStatus,

    /// Reason for non-completed outcomes
    pub reason: Option<String>,

    /// When the core processed the instruction
    pub processed_at: DateTime<Utc>,
}

impl TransactionResponse {
    /// A COMPLETED response stamped now
    pub fn completed(transaction_reference: impl Into<String>) -> Self {
        Self {
            transaction_id: Uuid::new_v4().to_string(),
            transaction_reference: transaction_reference.into(),
            status: TransactionStatus::Completed,
            reason: None,
            processed_at: Utc::now(),
        }
    }

    /// A PENDING acknowledgement stamped now
    pub fn pending(transaction_reference: impl Into<String>) -> Self {
        Self {
            transaction_id: Uuid::new_v4().to_string(),
            transaction_reference: transaction_reference.into(),
            status: TransactionStatus::Pending,
            reason: None,
            processed_at: Utc::now(),
        }
    }
}

/// Per-(tenant, bank) adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreBankingConfig {
    /// Configuration id
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: String,

    /// Bank the adapter fronts
    pub bank_code: String,

    /// Transport flavor
    pub adapter_kind: AdapterKind,

    /// Base URL for REST/GRPC transports
    pub base_url: Option<String>,

    /// Authentication towards the core
    pub auth_method: AuthMethod,

    /// Dispatch mode
    pub processing_mode: ProcessingMode,

    /// Payload format
    pub message_format: MessageFormat,

    /// Per-call timeout (milliseconds)
    pub timeout_ms: u64,

    /// Retry attempts for the envelope
    pub retry_attempts: u32,

    /// Highest priority active configuration wins
    pub priority: i32,

    /// Inactive configurations are never selected
    pub active: bool,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl CoreBankingConfig {
    /// Create an active configuration with defaults for the given transport
    pub fn new(
        tenant_id: impl Into<String>,
        bank_code: impl Into<String>,
        adapter_kind: AdapterKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            bank_code: bank_code.into(),
            adapter_kind,
            base_url: None,
            auth_method: AuthMethod::None,
            processing_mode: ProcessingMode::Sync,
            message_format: MessageFormat::Json,
            timeout_ms: 30_000,
            retry_attempts: 3,
            priority: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Store of core banking configurations keyed by (tenant, bank)
pub struct CoreBankingConfigStore {
    configs: DashMap<(String, String), Vec<CoreBankingConfig>>,
}

impl CoreBankingConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
        }
    }

    /// Register or replace a configuration by id
    pub fn upsert(&self, config: CoreBankingConfig) {
        let key = (config.tenant_id.clone(), config.bank_code.clone());
        let mut entry = self.configs.entry(key).or_default();
        entry.retain(|c| c.id != config.id);
        entry.push(config);
    }

    /// Resolve the active configuration with the highest priority
    pub fn resolve(&self, tenant_id: &str, bank_code: &str) -> Option<CoreBankingConfig> {
        self.configs
            .get(&(tenant_id.to_string(), bank_code.to_string()))
            .and_then(|configs| {
                configs
                    .iter()
                    .filter(|c| c.active)
                    .max_by_key(|c| c.priority)
                    .cloned()
            })
    }

    /// All configurations for a tenant
    pub fn list(&self, tenant_id: &str) -> Vec<CoreBankingConfig> {
        self.configs
            .iter()
            .filter(|e| e.key().0 == tenant_id)
            .flat_map(|e| e.value().clone())
            .collect()
    }
}

impl Default for CoreBankingConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-endpoint configuration under a core banking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint configuration id
    pub id: Uuid,

    /// Owning core banking configuration
    pub core_banking_config_id: Uuid,

    /// Logical endpoint type (e.g. DEBIT, CREDIT, ACCOUNT_INFO)
    pub endpoint_type: String,

    /// HTTP method
    pub http_method: String,

    /// Path relative to the adapter base URL
    pub path: String,

    /// Opaque auth settings for this endpoint
    pub auth_config: serde_json::Value,

    /// Per-endpoint timeout override (milliseconds)
    pub timeout_ms: Option<u64>,

    /// Per-endpoint retry override
    pub retry_attempts: Option<u32>,

    /// Circuit breaker override for the envelope
    pub circuit_breaker: Option<resiliency::CircuitBreakerConfig>,

    /// Rate limiter override for the envelope
    pub rate_limiter: Option<resiliency::RateLimiterConfig>,

    /// Request mapping name in the transformation registry
    pub request_mapping: Option<String>,

    /// Response mapping name in the transformation registry
    pub response_mapping: Option<String>,

    /// Validation rules over the final request payload
    pub validation_rules: Vec<transform::ValidationRule>,

    /// Opaque error-handling settings
    pub error_handling: serde_json::Value,

    /// Highest priority wins among endpoints of the same type
    pub priority: i32,

    /// Inactive endpoints are never selected
    pub active: bool,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Store of endpoint configurations keyed by core banking configuration
pub struct EndpointConfigStore {
    endpoints: DashMap<Uuid, Vec<EndpointConfig>>,
}

impl EndpointConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            endpoints: DashMap::new(),
        }
    }

    /// Register or replace an endpoint by id
    pub fn upsert(&self, endpoint: EndpointConfig) {
        let mut entry = self
            .endpoints
            .entry(endpoint.core_banking_config_id)
            .or_default();
        entry.retain(|e| e.id != endpoint.id);
        entry.push(endpoint);
    }

    /// Resolve the active endpoint of a type with the highest priority
    pub fn resolve(&self, core_banking_config_id: Uuid, endpoint_type: &str) -> Option<EndpointConfig> {
        self.endpoints.get(&core_banking_config_id).and_then(|endpoints| {
            endpoints
                .iter()
                .filter(|e| e.active && e.endpoint_type == endpoint_type)
                .max_by_key(|e| e.priority)
                .cloned()
        })
    }

    /// All endpoints under a core banking configuration
    pub fn list(&self, core_banking_config_id: Uuid) -> Vec<EndpointConfig> {
        self.endpoints
            .get(&core_banking_config_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl Default for EndpointConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_store_priority() {
        let store = CoreBankingConfigStore::new();

        let mut low = CoreBankingConfig::new("demo-bank", "BANK001", AdapterKind::Rest);
        low.priority = 1;
        store.upsert(low);

        let mut high = CoreBankingConfig::new("demo-bank", "BANK001", AdapterKind::Internal);
        high.priority = 5;
        store.upsert(high.clone());

        let mut inactive = CoreBankingConfig::new("demo-bank", "BANK001", AdapterKind::Grpc);
        inactive.priority = 9;
        inactive.active = false;
        store.upsert(inactive);

        let resolved = store.resolve("demo-bank", "BANK001").unwrap();
        assert_eq!(resolved.id, high.id);
        assert_eq!(resolved.adapter_kind, AdapterKind::Internal);
    }

    #[test]
    fn test_config_store_isolation_by_tenant() {
        let store = CoreBankingConfigStore::new();
        store.upsert(CoreBankingConfig::new("demo-bank", "BANK001", AdapterKind::Rest));

        assert!(store.resolve("other-bank", "BANK001").is_none());
        assert_eq!(store.list("demo-bank").len(), 1);
    }

    #[test]
    fn test_endpoint_store_resolution() {
        let store = EndpointConfigStore::new();
        let config_id = Uuid::new_v4();

        let endpoint = EndpointConfig {
            id: Uuid::new_v4(),
            core_banking_config_id: config_id,
            endpoint_type: "DEBIT".to_string(),
            http_method: "POST".to_string(),
            path: "/transactions/debit".to_string(),
            auth_config: serde_json::json!({}),
            timeout_ms: Some(5_000),
            retry_attempts: None,
            circuit_breaker: None,
            rate_limiter: None,
            request_mapping: Some("debit-request".to_string()),
            response_mapping: None,
            validation_rules: vec![],
            error_handling: serde_json::json!({}),
            priority: 0,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.upsert(endpoint);

        assert!(store.resolve(config_id, "DEBIT").is_some());
        assert!(store.resolve(config_id, "CREDIT").is_none());
    }
}
