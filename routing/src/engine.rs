//! Routing engine
//!
//! Classifies a payment as intra-bank or cross-clearing and derives the
//! full dispatch route. Rule resolution order, first hit wins:
//!
//! 1. Tenant rule keyed `paymentType:localInstrument`, then `paymentType`,
//!    then `localInstrument`
//! 2. Global payment-type rule
//! 3. Global local-instrument rule
//! 4. System default

use crate::clearing::ClearingSystemRegistry;
use crate::types::{PaymentRoute, PaymentRoutingRule, RoutingType};
use crate::{Error, Result};
use banking::{CoreBankingAdapter, MessageFormat, ProcessingMode};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Inputs for one routing decision
#[derive(Debug, Clone)]
pub struct RouteContext {
    /// Requesting tenant
    pub tenant_id: String,

    /// Payment type (e.g. WIRE_DOMESTIC, ACH_CREDIT)
    pub payment_type: String,

    /// Local instrument code (e.g. WIRE, CCD, RTP)
    pub local_instrument_code: String,

    /// ISO 20022 message type (e.g. pacs.008)
    pub message_type: String,

    /// Debtor account, when known
    pub from_account: Option<String>,

    /// Creditor account, when known
    pub to_account: Option<String>,
}

/// Store of routing rules resolved tenant-first, then global, then default
pub struct RoutingRuleStore {
    rules: RwLock<Vec<PaymentRoutingRule>>,
    default_rule: RwLock<Option<PaymentRoutingRule>>,
}

impl RoutingRuleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            default_rule: RwLock::new(None),
        }
    }

    /// Register or replace a rule by id
    pub fn upsert(&self, rule: PaymentRoutingRule) {
        let mut rules = self.rules.write();
        rules.retain(|r| r.id != rule.id);
        rules.push(rule);
    }

    /// Set the system default applied when nothing else matches
    pub fn set_default(&self, rule: PaymentRoutingRule) {
        *self.default_rule.write() = Some(rule);
    }

    /// All registered rules
    pub fn list(&self) -> Vec<PaymentRoutingRule> {
        self.rules.read().clone()
    }

    /// Resolve the first matching rule for a context
    pub fn resolve(
        &self,
        tenant_id: &str,
        payment_type: &str,
        local_instrument_code: &str,
    ) -> Option<PaymentRoutingRule> {
        let rules = self.rules.read();

        let pick = |pred: fn(&PaymentRoutingRule, &str, &str, &str) -> bool| {
            rules
                .iter()
                .filter(|r| r.active)
                .filter(|r| pred(r, tenant_id, payment_type, local_instrument_code))
                .max_by_key(|r| r.priority)
                .cloned()
        };

        // Tenant rule on paymentType + localInstrument
        pick(|r, t, pt, li| {
            r.tenant_id.as_deref() == Some(t)
                && r.payment_type.as_deref() == Some(pt)
                && r.local_instrument_code.as_deref() == Some(li)
        })
        // Tenant rule on paymentType
        .or_else(|| {
            pick(|r, t, pt, _| {
                r.tenant_id.as_deref() == Some(t)
                    && r.payment_type.as_deref() == Some(pt)
                    && r.local_instrument_code.is_none()
            })
        })
        // Tenant rule on localInstrument
        .or_else(|| {
            pick(|r, t, _, li| {
                r.tenant_id.as_deref() == Some(t)
                    && r.payment_type.is_none()
                    && r.local_instrument_code.as_deref() == Some(li)
            })
        })
        // Global paymentType mapping
        .or_else(|| pick(|r, _, pt, _| r.tenant_id.is_none() && r.payment_type.as_deref() == Some(pt)))
        // Global localInstrument mapping
        .or_else(|| {
            pick(|r, _, _, li| {
                r.tenant_id.is_none()
                    && r.payment_type.is_none()
                    && r.local_instrument_code.as_deref() == Some(li)
            })
        })
        // Tenant catch-all wildcard
        .or_else(|| {
            pick(|r, t, _, _| {
                r.tenant_id.as_deref() == Some(t)
                    && r.payment_type.is_none()
                    && r.local_instrument_code.is_none()
            })
        })
        // System default
        .or_else(|| self.default_rule.read().clone())
    }
}

impl Default for RoutingRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Routing engine over rules, the clearing registry, and the core adapter
pub struct RoutingEngine {
    rules: Arc<RoutingRuleStore>,
    clearing: Arc<ClearingSystemRegistry>,
    adapter: Arc<dyn CoreBankingAdapter>,
}

impl RoutingEngine {
    /// Create an engine
    pub fn new(
        rules: Arc<RoutingRuleStore>,
        clearing: Arc<ClearingSystemRegistry>,
        adapter: Arc<dyn CoreBankingAdapter>,
    ) -> Self {
        Self {
            rules,
            clearing,
            adapter,
        }
    }

    /// Rule store backing this engine
    pub fn rules(&self) -> &Arc<RoutingRuleStore> {
        &self.rules
    }

    /// Clearing registry backing this engine
    pub fn clearing(&self) -> &Arc<ClearingSystemRegistry> {
        &self.clearing
    }

    /// Derive the route for a payment context.
    ///
    /// For a fixed configuration set this is a pure function of its
    /// inputs: same context, same route.
    pub async fn route_message(&self, ctx: &RouteContext) -> Result<PaymentRoute> {
        // Same-bank classification comes from the core's own account books
        if let (Some(from), Some(to)) = (&ctx.from_account, &ctx.to_account) {
            let same_bank = self
                .adapter
                .is_same_bank_payment(&ctx.tenant_id, from, to)
                .await
                .map_err(|e| Error::BankLookup(e.to_string()))?;

            if same_bank {
                debug!(
                    "Routing {}/{} as SAME_BANK",
                    ctx.payment_type, ctx.local_instrument_code
                );
                return Ok(PaymentRoute {
                    routing_type: RoutingType::SameBank,
                    clearing_system_code: None,
                    clearing_system_name: None,
                    local_instrument_code: ctx.local_instrument_code.clone(),
                    payment_type: ctx.payment_type.clone(),
                    requires_clearing_system: false,
                    processing_mode: ProcessingMode::Sync,
                    message_format: MessageFormat::Json,
                    endpoint_url: None,
                    auth_method: None,
                    scheme_configuration_id: PaymentRoute::scheme_configuration_id(
                        "internal",
                        &ctx.message_type,
                    ),
                });
            }
        }

        let rule = self
            .rules
            .resolve(&ctx.tenant_id, &ctx.payment_type, &ctx.local_instrument_code)
            .ok_or_else(|| Error::NoRouteFound {
                tenant_id: ctx.tenant_id.clone(),
                payment_type: ctx.payment_type.clone(),
            })?;

        // A rule may omit the clearing code; the core adapter then supplies
        // its preference for the payment type
        let clearing_code = match rule.clearing_system_code.clone() {
            Some(code) => code,
            None => self
                .adapter
                .get_clearing_system_for_payment(
                    &ctx.tenant_id,
                    &ctx.payment_type,
                    &ctx.local_instrument_code,
                )
                .await
                .map_err(|_| Error::NoClearingSystemFound {
                    payment_type: ctx.payment_type.clone(),
                    local_instrument_code: ctx.local_instrument_code.clone(),
                })?,
        };

        let clearing = self.clearing.select(
            &clearing_code,
            &ctx.tenant_id,
            &ctx.payment_type,
            &ctx.local_instrument_code,
            &ctx.message_type,
        )?;

        info!(
            "Routing {}/{} for tenant {} via {} ({:?})",
            ctx.payment_type,
            ctx.local_instrument_code,
            ctx.tenant_id,
            clearing.code,
            rule.routing_type
        );

        Ok(PaymentRoute {
            routing_type: rule.routing_type,
            clearing_system_code: Some(clearing.code.clone()),
            clearing_system_name: Some(clearing.name.clone()),
            local_instrument_code: ctx.local_instrument_code.clone(),
            payment_type: ctx.payment_type.clone(),
            requires_clearing_system: true,
            processing_mode: rule.processing_mode.unwrap_or(ProcessingMode::Async),
            message_format: rule.message_format.unwrap_or(MessageFormat::Xml),
            endpoint_url: Some(clearing.endpoint_url.clone()),
            auth_method: Some(clearing.auth_method),
            scheme_configuration_id: PaymentRoute::scheme_configuration_id(
                &clearing.code,
                &ctx.message_type,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clearing::ClearingSystemConfig;
    use banking::InternalAdapter;
    use rust_decimal::Decimal;

    fn engine() -> RoutingEngine {
        let adapter = Arc::new(InternalAdapter::new("BANK001"));
        adapter.open_account("ACC-100", "Alice", "USD", Decimal::new(500000, 2));
        adapter.open_account("ACC-200", "Bob", "USD", Decimal::new(500000, 2));

        let rules = Arc::new(RoutingRuleStore::new());
        let clearing = Arc::new(ClearingSystemRegistry::new());
        clearing.upsert(ClearingSystemConfig::new(
            "ACH",
            "Automated Clearing House",
            "US",
            "USD",
            "https://ach.example.com/iso20022",
        ));
        clearing.upsert(ClearingSystemConfig::new(
            "FEDWIRE",
            "Fedwire Funds Service",
            "US",
            "USD",
            "https://fedwire.example.com/iso20022",
        ));

        RoutingEngine::new(rules, clearing, adapter)
    }

    fn ctx(payment_type: &str, instrument: &str, from: &str, to: &str) -> RouteContext {
        RouteContext {
            tenant_id: "demo-bank".to_string(),
            payment_type: payment_type.to_string(),
            local_instrument_code: instrument.to_string(),
            message_type: "pacs.008".to_string(),
            from_account: Some(from.to_string()),
            to_account: Some(to.to_string()),
        }
    }

    #[tokio::test]
    async fn test_same_bank_route() {
        let engine = engine();
        let route = engine
            .route_message(&ctx("WIRE_DOMESTIC", "WIRE", "ACC-100", "ACC-200"))
            .await
            .unwrap();

        assert_eq!(route.routing_type, RoutingType::SameBank);
        assert!(!route.requires_clearing_system);
        assert!(route.clearing_system_code.is_none());
        assert_eq!(route.processing_mode, ProcessingMode::Sync);
        assert_eq!(route.message_format, MessageFormat::Json);
    }

    #[tokio::test]
    async fn test_other_bank_route_via_rule() {
        let engine = engine();
        engine.rules.upsert(PaymentRoutingRule::clearing(
            None,
            Some("ACH_CREDIT".to_string()),
            None,
            "ACH",
        ));

        let route = engine
            .route_message(&ctx("ACH_CREDIT", "CCD", "ACC-100", "EXT-999"))
            .await
            .unwrap();

        assert_eq!(route.routing_type, RoutingType::OtherBank);
        assert_eq!(route.clearing_system_code.as_deref(), Some("ACH"));
        assert_eq!(route.processing_mode, ProcessingMode::Async);
        assert_eq!(route.message_format, MessageFormat::Xml);
        assert!(route.requires_clearing_system);
        assert_eq!(route.scheme_configuration_id, "scheme-ach-pacs.008");
        assert_eq!(
            route.endpoint_url.as_deref(),
            Some("https://ach.example.com/iso20022")
        );
    }

    #[tokio::test]
    async fn test_tenant_rule_beats_global() {
        let engine = engine();
        engine.rules.upsert(PaymentRoutingRule::clearing(
            None,
            Some("ACH_CREDIT".to_string()),
            None,
            "ACH",
        ));
        engine.rules.upsert(PaymentRoutingRule::clearing(
            Some("demo-bank".to_string()),
            Some("ACH_CREDIT".to_string()),
            Some("CCD".to_string()),
            "FEDWIRE",
        ));

        let route = engine
            .route_message(&ctx("ACH_CREDIT", "CCD", "ACC-100", "EXT-999"))
            .await
            .unwrap();
        assert_eq!(route.clearing_system_code.as_deref(), Some("FEDWIRE"));

        // A different instrument misses the tenant rule and falls through
        let route = engine
            .route_message(&ctx("ACH_CREDIT", "PPD", "ACC-100", "EXT-999"))
            .await
            .unwrap();
        assert_eq!(route.clearing_system_code.as_deref(), Some("ACH"));
    }

    #[tokio::test]
    async fn test_rule_overrides_mode_and_format() {
        let engine = engine();
        let mut rule = PaymentRoutingRule::clearing(None, Some("RTP".to_string()), None, "FEDWIRE");
        rule.processing_mode = Some(ProcessingMode::Sync);
        rule.message_format = Some(MessageFormat::Json);
        engine.rules.upsert(rule);

        let route = engine
            .route_message(&ctx("RTP", "RTP", "ACC-100", "EXT-999"))
            .await
            .unwrap();
        assert_eq!(route.processing_mode, ProcessingMode::Sync);
        assert_eq!(route.message_format, MessageFormat::Json);
    }

    #[tokio::test]
    async fn test_no_route_found() {
        let engine = engine();
        let result = engine
            .route_message(&ctx("CHECK_21", "CHECK", "ACC-100", "EXT-999"))
            .await;
        assert!(matches!(result, Err(Error::NoRouteFound { .. })));
    }

    #[tokio::test]
    async fn test_default_rule_applies_last() {
        let engine = engine();
        engine
            .rules
            .set_default(PaymentRoutingRule::clearing(None, None, None, "FEDWIRE"));

        let route = engine
            .route_message(&ctx("CHECK_21", "CHECK", "ACC-100", "EXT-999"))
            .await
            .unwrap();
        assert_eq!(route.clearing_system_code.as_deref(), Some("FEDWIRE"));
    }

    #[tokio::test]
    async fn test_routing_is_deterministic() {
        let engine = engine();
        engine.rules.upsert(PaymentRoutingRule::clearing(
            None,
            Some("ACH_CREDIT".to_string()),
            None,
            "ACH",
        ));

        let context = ctx("ACH_CREDIT", "CCD", "ACC-100", "EXT-999");
        let first = engine.route_message(&context).await.unwrap();
        let second = engine.route_message(&context).await.unwrap();

        assert_eq!(first.clearing_system_code, second.clearing_system_code);
        assert_eq!(first.processing_mode, second.processing_mode);
        assert_eq!(first.scheme_configuration_id, second.scheme_configuration_id);
    }
}
