//! Per-endpoint payload gate
//!
//! Before a leg is dispatched, the payment's canonical payload runs
//! through the endpoint's request mapping and validation rules: the
//! mapping shapes the wire payload for the external schema, and a failed
//! validation stops the payment before any ledger effect.

use crate::types::PaymentInstruction;
use banking::{CoreBankingConfigStore, EndpointConfigStore};
use std::sync::Arc;
use tracing::debug;
use transform::{MappingDirection, MappingRegistry, PayloadTransformer};

/// Endpoint types the orchestrator resolves per leg
pub mod endpoint_types {
    /// Debit leg endpoint
    pub const DEBIT: &str = "DEBIT";
    /// Credit leg endpoint
    pub const CREDIT: &str = "CREDIT";
}

/// Outcome of gating one leg
#[derive(Debug, Clone)]
pub struct GatedPayload {
    /// Wire payload after the endpoint's request mapping (canonical when
    /// no mapping is configured)
    pub payload: serde_json::Value,

    /// Validation errors; non-empty stops the dispatch
    pub violations: Vec<String>,
}

impl GatedPayload {
    /// Whether the dispatch may proceed
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Resolves endpoint configuration and applies mapping + validation
pub struct EndpointGate {
    core_configs: Arc<CoreBankingConfigStore>,
    endpoints: Arc<EndpointConfigStore>,
    mappings: Arc<MappingRegistry>,
    transformer: PayloadTransformer,
}

impl EndpointGate {
    /// Create a gate over the configuration stores
    pub fn new(
        core_configs: Arc<CoreBankingConfigStore>,
        endpoints: Arc<EndpointConfigStore>,
        mappings: Arc<MappingRegistry>,
    ) -> Self {
        Self {
            core_configs,
            endpoints,
            mappings,
            transformer: PayloadTransformer::new(),
        }
    }

    /// Core banking configuration store
    pub fn core_configs(&self) -> &Arc<CoreBankingConfigStore> {
        &self.core_configs
    }

    /// Endpoint configuration store
    pub fn endpoints(&self) -> &Arc<EndpointConfigStore> {
        &self.endpoints
    }

    /// Mapping registry
    pub fn mappings(&self) -> &Arc<MappingRegistry> {
        &self.mappings
    }

    /// Gate one leg of a payment against its endpoint configuration.
    ///
    /// A tenant/bank pair with no configuration passes through untouched;
    /// the gate only constrains what operators have configured.
    pub fn check(
        &self,
        bank_code: &str,
        endpoint_type: &str,
        instruction: &PaymentInstruction,
    ) -> GatedPayload {
        let canonical = serde_json::json!({
            "transactionReference": instruction.transaction_reference,
            "tenantId": instruction.tenant_id,
            "fromAccount": instruction.from_account,
            "toAccount": instruction.to_account,
            "amount": instruction.amount,
            "currency": instruction.currency,
            "paymentType": instruction.payment_type,
            "localInstrumentCode": instruction.local_instrument_code,
            "narrative": instruction.narrative,
        });

        let Some(config) = self
            .core_configs
            .resolve(&instruction.tenant_id, bank_code)
        else {
            return GatedPayload {
                payload: canonical,
                violations: Vec::new(),
            };
        };

        let Some(endpoint) = self.endpoints.resolve(config.id, endpoint_type) else {
            return GatedPayload {
                payload: canonical,
                violations: Vec::new(),
            };
        };

        let mut payload = canonical;
        let mut violations = Vec::new();

        if let Some(mapping_name) = &endpoint.request_mapping {
            match self
                .mappings
                .resolve(endpoint.id, mapping_name, MappingDirection::Request, None)
            {
                Ok(mapping) => match self.transformer.transform(&mapping, &payload) {
                    Ok(outcome) => {
                        debug!(
                            "Applied mapping '{}' v{} for endpoint {}",
                            mapping_name, mapping.version, endpoint_type
                        );
                        for error in &outcome.validation.errors {
                            violations.push(format!("{}: {}", error.path, error.message));
                        }
                        payload = outcome.payload;
                    }
                    Err(e) => violations.push(e.to_string()),
                },
                Err(e) => violations.push(e.to_string()),
            }
        }

        let report = transform::validate(&payload, &endpoint.validation_rules);
        for error in report.errors {
            violations.push(format!("{}: {}", error.path, error.message));
        }

        GatedPayload {
            payload,
            violations,
        }
    }
}
