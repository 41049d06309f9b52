//! Error types for the routing engine

use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Routing errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// No rule or mapping yields a clearing system for the context
    #[error("No clearing system found for payment type '{payment_type}', instrument '{local_instrument_code}'")]
    NoClearingSystemFound {
        /// Requested payment type
        payment_type: String,
        /// Requested local instrument
        local_instrument_code: String,
    },

    /// The resolved clearing system is configured but inactive
    #[error("Clearing system '{0}' is inactive")]
    ClearingSystemInactive(String),

    /// The tenant may not use the resolved clearing system
    #[error("Tenant '{tenant_id}' is not authorized for clearing system '{clearing_system_code}'")]
    TenantNotAuthorizedForClearingSystem {
        /// Requesting tenant
        tenant_id: String,
        /// Clearing system the tenant asked for
        clearing_system_code: String,
    },

    /// The clearing system does not support the requested message/payment type
    #[error("Clearing system '{clearing_system_code}' does not support {what} '{value}'")]
    UnsupportedByClearingSystem {
        /// Clearing system code
        clearing_system_code: String,
        /// Dimension that failed (message type, payment type, instrument)
        what: &'static str,
        /// Offending value
        value: String,
    },

    /// No routing rule matches and no system default is configured
    #[error("No routing rule matches tenant '{tenant_id}', payment type '{payment_type}'")]
    NoRouteFound {
        /// Requesting tenant
        tenant_id: String,
        /// Requested payment type
        payment_type: String,
    },

    /// Same-bank probe against the core failed
    #[error("Bank lookup failed: {0}")]
    BankLookup(String),
}
