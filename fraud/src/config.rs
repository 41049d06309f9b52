//! Fraud configuration store and wildcard matching

use crate::types::{FraudConfiguration, PaymentSource};
use parking_lot::RwLock;

/// Context a configuration is matched against
#[derive(Debug, Clone)]
pub struct MatchContext<'a> {
    /// Requesting tenant
    pub tenant_id: &'a str,

    /// Payment type
    pub payment_type: &'a str,

    /// Local instrument, when known
    pub local_instrument_code: Option<&'a str>,

    /// Clearing system, when known
    pub clearing_system_code: Option<&'a str>,

    /// Where the payment came from
    pub payment_source: PaymentSource,
}

/// Store of fraud configurations
pub struct FraudConfigStore {
    configs: RwLock<Vec<FraudConfiguration>>,
}

impl FraudConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(Vec::new()),
        }
    }

    /// Register or replace a configuration by (tenant, name)
    pub fn upsert(&self, config: FraudConfiguration) {
        let mut configs = self.configs.write();
        configs.retain(|c| {
            !(c.tenant_id == config.tenant_id
                && c.configuration_name == config.configuration_name)
        });
        configs.push(config);
    }

    /// All configurations for a tenant
    pub fn list(&self, tenant_id: &str) -> Vec<FraudConfiguration> {
        self.configs
            .read()
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Select enabled configurations applicable to a context.
    ///
    /// `None` qualifier fields act as wildcards. Order: ascending priority;
    /// the strictest match wins inside one priority band.
    pub fn select(&self, ctx: &MatchContext<'_>) -> Vec<FraudConfiguration> {
        let mut matched: Vec<FraudConfiguration> = self
            .configs
            .read()
            .iter()
            .filter(|c| c.enabled && Self::matches(c, ctx))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.specificity().cmp(&a.specificity()))
                .then(a.configuration_name.cmp(&b.configuration_name))
        });
        matched
    }

    fn matches(config: &FraudConfiguration, ctx: &MatchContext<'_>) -> bool {
        if config.tenant_id != ctx.tenant_id {
            return false;
        }
        if let Some(ref pt) = config.payment_type {
            if pt != ctx.payment_type {
                return false;
            }
        }
        if let Some(ref li) = config.local_instrument_code {
            if ctx.local_instrument_code != Some(li.as_str()) {
                return false;
            }
        }
        if let Some(ref cs) = config.clearing_system_code {
            if ctx.clearing_system_code != Some(cs.as_str()) {
                return false;
            }
        }
        config.payment_source.covers(ctx.payment_source)
    }
}

impl Default for FraudConfigStore {
    fn default() -> Self {
        Self::new()
    }
}
