//! Fraud/Risk Assessment Pipeline
//!
//! A priority-ordered configuration engine that consults risk rules,
//! optional external fraud APIs (through the resiliency envelope), decision
//! criteria, and score thresholds, returning an APPROVE / REJECT /
//! MANUAL_REVIEW / HOLD / ESCALATE decision that gates the payment
//! orchestrator. Suspended decisions enter a priority-ordered review queue
//! with expiry.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod external;
pub mod pipeline;
pub mod rules;
pub mod types;

// Re-exports
pub use config::{FraudConfigStore, MatchContext};
pub use error::{ApiFailure, Error, Result};
pub use external::{build_request, ExternalApiResponse, FraudApiClient, HttpFraudApiClient};
pub use pipeline::{AssessmentRequest, FraudPipeline, ReviewQueueEntry};
pub use types::{
    AssessmentStatus, CriterionExpr, Decision, DecisionCriterion, ExternalApiConfig,
    FallbackConfig, FraudAssessment, FraudConfiguration, PaymentSource, RiskAssessmentType,
    RiskLevel, RiskRule, RuleOperator, Thresholds,
};
