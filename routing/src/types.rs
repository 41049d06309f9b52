//! Routing rules and the derived payment route

use banking::{AuthMethod, MessageFormat, ProcessingMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a payment leaves (or enters) the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingType {
    /// Both accounts at the same bank; booked internally
    SameBank,
    /// Leaves through a clearing network
    OtherBank,
    /// Arrived from a clearing network
    IncomingClearing,
    /// Hands off to an external processing system
    ExternalSystem,
}

/// Configured routing rule.
///
/// `None` qualifier fields act as wildcards; tenant-specific rules beat
/// global rules, and priority breaks ties inside one specificity tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRoutingRule {
    /// Rule id
    pub id: Uuid,

    /// Owning tenant; `None` makes this a global rule
    pub tenant_id: Option<String>,

    /// Payment type the rule matches
    pub payment_type: Option<String>,

    /// Local instrument the rule matches
    pub local_instrument_code: Option<String>,

    /// Route classification this rule produces
    pub routing_type: RoutingType,

    /// Clearing system for OTHER_BANK routes
    pub clearing_system_code: Option<String>,

    /// Dispatch mode override
    pub processing_mode: Option<ProcessingMode>,

    /// Wire format override
    pub message_format: Option<MessageFormat>,

    /// Higher priority wins inside a specificity tier
    pub priority: i32,

    /// Inactive rules are never matched
    pub active: bool,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl PaymentRoutingRule {
    /// Create an active OTHER_BANK rule towards a clearing system
    pub fn clearing(
        tenant_id: Option<String>,
        payment_type: Option<String>,
        local_instrument_code: Option<String>,
        clearing_system_code: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            payment_type,
            local_instrument_code,
            routing_type: RoutingType::OtherBank,
            clearing_system_code: Some(clearing_system_code.into()),
            processing_mode: None,
            message_format: None,
            priority: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Derived route for one payment context; never persisted as authoritative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRoute {
    /// Route classification
    pub routing_type: RoutingType,

    /// Clearing system code, when one is required
    pub clearing_system_code: Option<String>,

    /// Clearing system display name
    pub clearing_system_name: Option<String>,

    /// Local instrument the route was resolved for
    pub local_instrument_code: String,

    /// Payment type the route was resolved for
    pub payment_type: String,

    /// Whether dispatch must go through a clearing system
    pub requires_clearing_system: bool,

    /// Dispatch mode
    pub processing_mode: ProcessingMode,

    /// Wire format
    pub message_format: MessageFormat,

    /// Clearing endpoint URL for OTHER_BANK routes
    pub endpoint_url: Option<String>,

    /// Auth method towards the clearing endpoint
    pub auth_method: Option<AuthMethod>,

    /// Scheme configuration id: `scheme-<code>-<messageType>` lowercased
    pub scheme_configuration_id: String,
}

impl PaymentRoute {
    /// Derive the scheme configuration id for a clearing code + message type
    pub fn scheme_configuration_id(clearing_code: &str, message_type: &str) -> String {
        format!("scheme-{}-{}", clearing_code, message_type).to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_configuration_id() {
        assert_eq!(
            PaymentRoute::scheme_configuration_id("ACH", "pacs.008"),
            "scheme-ach-pacs.008"
        );
        assert_eq!(
            PaymentRoute::scheme_configuration_id("FEDWIRE", "PACS.008"),
            "scheme-fedwire-pacs.008"
        );
    }
}
