//! Clearing system registry

use crate::{Error, Result};
use banking::{AuthMethod, ProcessingMode};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Configuration of one external clearing network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearingSystemConfig {
    /// Scheme code (e.g. FEDWIRE, ACH, RTP, SEPA, CHAPS)
    pub code: String,

    /// Display name
    pub name: String,

    /// Operating country (ISO 3166)
    pub country: String,

    /// Settlement currency (ISO 4217)
    pub currency: String,

    /// Supported ISO 20022 message types; empty means all
    pub supported_message_types: Vec<String>,

    /// Supported payment types; empty means all
    pub supported_payment_types: Vec<String>,

    /// Supported local instruments; empty means all
    pub supported_local_instruments: Vec<String>,

    /// Dispatch mode the scheme expects
    pub processing_mode: ProcessingMode,

    /// Scheme-side timeout (seconds)
    pub timeout_seconds: u64,

    /// Scheme endpoint URL
    pub endpoint_url: String,

    /// Auth towards the scheme endpoint
    pub auth_method: AuthMethod,

    /// Inactive systems are never selected
    pub active: bool,

    /// Tenants allowed to clear through this system; empty means all
    pub authorized_tenants: Vec<String>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl ClearingSystemConfig {
    /// Create an active configuration with open tenant access
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        country: impl Into<String>,
        currency: impl Into<String>,
        endpoint_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            code: code.into(),
            name: name.into(),
            country: country.into(),
            currency: currency.into(),
            supported_message_types: Vec::new(),
            supported_payment_types: Vec::new(),
            supported_local_instruments: Vec::new(),
            processing_mode: ProcessingMode::Async,
            timeout_seconds: 30,
            endpoint_url: endpoint_url.into(),
            auth_method: AuthMethod::MutualTls,
            active: true,
            authorized_tenants: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Registry of clearing systems keyed by scheme code
pub struct ClearingSystemRegistry {
    systems: DashMap<String, ClearingSystemConfig>,
}

impl ClearingSystemRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            systems: DashMap::new(),
        }
    }

    /// Register or replace a clearing system
    pub fn upsert(&self, config: ClearingSystemConfig) {
        self.systems.insert(config.code.clone(), config);
    }

    /// Fetch a clearing system without gate checks
    pub fn get(&self, code: &str) -> Option<ClearingSystemConfig> {
        self.systems.get(code).map(|c| c.clone())
    }

    /// All registered systems
    pub fn list(&self) -> Vec<ClearingSystemConfig> {
        self.systems.iter().map(|e| e.value().clone()).collect()
    }

    /// Select a clearing system for dispatch, enforcing the active flag,
    /// tenant authorization, and supported type sets.
    pub fn select(
        &self,
        code: &str,
        tenant_id: &str,
        payment_type: &str,
        local_instrument_code: &str,
        message_type: &str,
    ) -> Result<ClearingSystemConfig> {
        let config = self.systems.get(code).map(|c| c.clone()).ok_or_else(|| {
            Error::NoClearingSystemFound {
                payment_type: payment_type.to_string(),
                local_instrument_code: local_instrument_code.to_string(),
            }
        })?;

        if !config.active {
            return Err(Error::ClearingSystemInactive(code.to_string()));
        }

        if !config.authorized_tenants.is_empty()
            && !config.authorized_tenants.iter().any(|t| t == tenant_id)
        {
            return Err(Error::TenantNotAuthorizedForClearingSystem {
                tenant_id: tenant_id.to_string(),
                clearing_system_code: code.to_string(),
            });
        }

        if !config.supported_message_types.is_empty()
            && !config.supported_message_types.iter().any(|m| m == message_type)
        {
            return Err(Error::UnsupportedByClearingSystem {
                clearing_system_code: code.to_string(),
                what: "message type",
                value: message_type.to_string(),
            });
        }

        if !config.supported_payment_types.is_empty()
            && !config.supported_payment_types.iter().any(|p| p == payment_type)
        {
            return Err(Error::UnsupportedByClearingSystem {
                clearing_system_code: code.to_string(),
                what: "payment type",
                value: payment_type.to_string(),
            });
        }

        if !config.supported_local_instruments.is_empty()
            && !config
                .supported_local_instruments
                .iter()
                .any(|i| i == local_instrument_code)
        {
            return Err(Error::UnsupportedByClearingSystem {
                clearing_system_code: code.to_string(),
                what: "local instrument",
                value: local_instrument_code.to_string(),
            });
        }

        Ok(config)
    }
}

impl Default for ClearingSystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}
