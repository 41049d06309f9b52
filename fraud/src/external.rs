//! External fraud API client
//!
//! The request body starts from the configuration's opaque
//! `request_template`; the payment data and correlation fields are merged
//! in without touching template keys. Responses carry `{riskScore,
//! riskLevel, decision, assessmentDetails}`; unknown fields pass through
//! unchanged inside the details.

use crate::error::ApiFailure;
use crate::types::{Decision, ExternalApiConfig, RiskLevel};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Parsed external fraud API response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalApiResponse {
    /// Provider risk score in [0.0, 1.0]
    pub risk_score: Option<f64>,

    /// Provider risk level
    pub risk_level: Option<RiskLevel>,

    /// Provider decision
    pub decision: Option<Decision>,

    /// Provider-specific details, carried through unchanged
    #[serde(default)]
    pub assessment_details: Value,
}

/// External fraud API contract
#[async_trait]
pub trait FraudApiClient: Send + Sync {
    /// Call the provider with a fully built request body
    async fn assess(
        &self,
        config: &ExternalApiConfig,
        request: &Value,
    ) -> Result<ExternalApiResponse, ApiFailure>;
}

/// HTTP implementation over reqwest
pub struct HttpFraudApiClient {
    client: reqwest::Client,
}

impl HttpFraudApiClient {
    /// Create a client
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFraudApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FraudApiClient for HttpFraudApiClient {
    async fn assess(
        &self,
        config: &ExternalApiConfig,
        request: &Value,
    ) -> Result<ExternalApiResponse, ApiFailure> {
        let request_id = Uuid::new_v4().to_string();
        debug!("Calling fraud API '{}' [{}]", config.name, request_id);

        let mut builder = self
            .client
            .post(&config.url)
            .timeout(Duration::from_millis(config.timeout_ms))
            .header("X-Request-ID", request_id)
            .json(request);

        for (name, value) in &config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| ApiFailure {
            transient: e.is_timeout() || e.is_connect(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiFailure {
                transient: status.is_server_error(),
                reason: format!("fraud API returned {}", status),
            });
        }

        response.json::<ExternalApiResponse>().await.map_err(|e| ApiFailure {
            transient: false,
            reason: format!("fraud API response decode failed: {}", e),
        })
    }
}

/// Build the provider request from the opaque template and payment data.
///
/// Template keys win; the payment data lands under `payment` and the
/// correlation fields under `transactionReference`/`tenantId` only when the
/// template has not claimed those keys.
pub fn build_request(
    config: &ExternalApiConfig,
    transaction_reference: &str,
    tenant_id: &str,
    payment_data: &Value,
) -> Value {
    let mut request = match config.request_template.clone() {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(serde_json::Map::new()),
        other => {
            // Non-object templates are wrapped rather than discarded
            let mut map = serde_json::Map::new();
            map.insert("template".to_string(), other);
            Value::Object(map)
        }
    };

    let map = request.as_object_mut().expect("request is an object");
    map.entry("payment".to_string())
        .or_insert_with(|| payment_data.clone());
    map.entry("transactionReference".to_string())
        .or_insert_with(|| Value::String(transaction_reference.to_string()));
    map.entry("tenantId".to_string())
        .or_insert_with(|| Value::String(tenant_id.to_string()));

    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn config(template: Value) -> ExternalApiConfig {
        ExternalApiConfig {
            name: "acme-fraud".to_string(),
            url: "https://fraud.example.com/assess".to_string(),
            headers: BTreeMap::new(),
            request_template: template,
            timeout_ms: 2_000,
        }
    }

    #[test]
    fn test_build_request_merges_under_template() {
        let config = config(json!({"channel": "instant", "version": 2}));
        let request = build_request(
            &config,
            "TXN-1",
            "demo-bank",
            &json!({"amount": "100.00"}),
        );

        assert_eq!(request["channel"], json!("instant"));
        assert_eq!(request["version"], json!(2));
        assert_eq!(request["payment"]["amount"], json!("100.00"));
        assert_eq!(request["transactionReference"], json!("TXN-1"));
        assert_eq!(request["tenantId"], json!("demo-bank"));
    }

    #[test]
    fn test_template_keys_are_not_overwritten() {
        let config = config(json!({"payment": {"masked": true}}));
        let request = build_request(&config, "TXN-1", "demo-bank", &json!({"amount": "1"}));
        assert_eq!(request["payment"], json!({"masked": true}));
    }

    #[test]
    fn test_response_parsing_carries_unknown_fields() {
        let raw = json!({
            "riskScore": 0.92,
            "riskLevel": "CRITICAL",
            "decision": "REJECT",
            "assessmentDetails": {"provider": "acme", "model": "v7", "signals": [1, 2]}
        });

        let parsed: ExternalApiResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.risk_score, Some(0.92));
        assert_eq!(parsed.risk_level, Some(RiskLevel::Critical));
        assert_eq!(parsed.decision, Some(Decision::Reject));
        assert_eq!(parsed.assessment_details["model"], json!("v7"));
    }

    #[test]
    fn test_partial_response_parses() {
        let parsed: ExternalApiResponse =
            serde_json::from_value(json!({"riskScore": 0.1})).unwrap();
        assert_eq!(parsed.risk_score, Some(0.1));
        assert!(parsed.decision.is_none());
        assert!(parsed.risk_level.is_none());
    }
}
