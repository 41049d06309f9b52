//! Fraud/risk configuration and assessment types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Who submitted the payment being assessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentSource {
    /// Direct bank client submission
    BankClient,
    /// Arrived over a clearing network
    ClearingSystem,
    /// Configuration applies to both sources
    Both,
}

impl PaymentSource {
    /// Whether a configured source covers an actual one
    pub fn covers(&self, actual: PaymentSource) -> bool {
        matches!(self, PaymentSource::Both) || *self == actual
    }
}

/// Assessment execution style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskAssessmentType {
    /// Inline, before orchestration proceeds
    RealTime,
    /// Deferred batch evaluation
    Batch,
    /// Real-time scoring with batch enrichment
    Hybrid,
    /// Provider-specific semantics
    Custom,
}

/// Lifecycle of one assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentStatus {
    /// Created, not started
    Pending,
    /// Being evaluated
    InProgress,
    /// Finished with a decision
    Completed,
    /// Evaluation failed
    Error,
    /// Cancelled before completion
    Cancelled,
}

/// Risk level derived from the risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// score < 0.3
    Low,
    /// 0.3 <= score < 0.6
    Medium,
    /// 0.6 <= score < 0.8
    High,
    /// score >= 0.8
    Critical,
}

impl RiskLevel {
    /// Derive the level from a score in [0.0, 1.0]
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            RiskLevel::Low
        } else if score < 0.6 {
            RiskLevel::Medium
        } else if score < 0.8 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

/// Terminal pipeline decision fed to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Orchestrator proceeds
    Approve,
    /// Orchestrator halts; no ledger effect
    Reject,
    /// Suspend into the review queue
    ManualReview,
    /// Suspend and hold funds-side processing
    Hold,
    /// Suspend into the high-priority review queue
    Escalate,
}

impl Decision {
    /// Whether the decision parks the payment for human review
    pub fn needs_review(&self) -> bool {
        matches!(
            self,
            Decision::ManualReview | Decision::Hold | Decision::Escalate
        )
    }
}

/// Comparison operator for risk rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOperator {
    /// Numeric greater-than
    Gt,
    /// Numeric greater-or-equal
    Gte,
    /// Numeric less-than
    Lt,
    /// Numeric less-or-equal
    Lte,
    /// Equality (numeric or string)
    Eq,
    /// Inequality
    Ne,
    /// String containment
    Contains,
    /// Membership in a literal list
    In,
}

/// One configured risk rule over the payment data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRule {
    /// Rule name
    pub name: String,

    /// Dot-path into the payment data
    pub field: String,

    /// Comparison operator
    pub operator: RuleOperator,

    /// Literal to compare against
    pub value: Value,

    /// Added to the risk score when the rule fires
    pub score_delta: f64,

    /// Risk factor label recorded when the rule fires
    pub factor: String,
}

/// Boolean expression over the accumulated score and risk factors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriterionExpr {
    /// Risk score is at least the threshold
    ScoreAtLeast {
        /// Threshold in [0.0, 1.0]
        threshold: f64,
    },
    /// Risk score is below the threshold
    ScoreBelow {
        /// Threshold in [0.0, 1.0]
        threshold: f64,
    },
    /// A named risk factor was recorded
    FactorPresent {
        /// Factor label
        factor: String,
    },
    /// All sub-expressions hold
    And {
        /// Sub-expressions
        exprs: Vec<CriterionExpr>,
    },
    /// Any sub-expression holds
    Or {
        /// Sub-expressions
        exprs: Vec<CriterionExpr>,
    },
    /// Negation
    Not {
        /// Negated expression
        expr: Box<CriterionExpr>,
    },
}

/// Decision criterion: when the expression holds, decide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionCriterion {
    /// Guard expression
    pub when: CriterionExpr,

    /// Decision produced when the guard holds
    pub decision: Decision,

    /// Reason recorded on the assessment
    pub reason: String,
}

/// Score cutoffs applied when criteria produced no decision.
///
/// Checked severest first: escalate, reject, hold, manual review; a score
/// below `approve_below` approves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thresholds {
    /// Escalate at or above this score
    pub escalate_at: Option<f64>,

    /// Reject at or above this score
    pub reject_at: Option<f64>,

    /// Hold at or above this score
    pub hold_at: Option<f64>,

    /// Manual review at or above this score
    pub manual_review_at: Option<f64>,

    /// Approve strictly below this score
    pub approve_below: Option<f64>,
}

impl Thresholds {
    /// Apply the cutoffs to a score
    pub fn decide(&self, score: f64) -> Option<(Decision, String)> {
        if let Some(t) = self.escalate_at {
            if score >= t {
                return Some((Decision::Escalate, format!("risk score {:.2} >= escalate threshold {:.2}", score, t)));
            }
        }
        if let Some(t) = self.reject_at {
            if score >= t {
                return Some((Decision::Reject, format!("risk score {:.2} >= reject threshold {:.2}", score, t)));
            }
        }
        if let Some(t) = self.hold_at {
            if score >= t {
                return Some((Decision::Hold, format!("risk score {:.2} >= hold threshold {:.2}", score, t)));
            }
        }
        if let Some(t) = self.manual_review_at {
            if score >= t {
                return Some((Decision::ManualReview, format!("risk score {:.2} >= review threshold {:.2}", score, t)));
            }
        }
        if let Some(t) = self.approve_below {
            if score < t {
                return Some((Decision::Approve, format!("risk score {:.2} < approve threshold {:.2}", score, t)));
            }
        }
        None
    }
}

/// External fraud API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalApiConfig {
    /// API name for logs and envelope keys
    pub name: String,

    /// Endpoint URL
    pub url: String,

    /// Static headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// Opaque request template merged with the payment data
    pub request_template: Value,

    /// Per-call timeout (milliseconds)
    pub timeout_ms: u64,
}

/// Fallback applied when the external API fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Decision produced by the fallback
    pub decision: Decision,

    /// Risk level recorded by the fallback
    pub risk_level: RiskLevel,

    /// Reason recorded on the assessment
    pub reason: String,
}

/// One fraud/risk configuration.
///
/// `None` qualifier fields act as wildcards; selection is strictest match
/// first, then ascending priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudConfiguration {
    /// Configuration name
    pub configuration_name: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Payment type qualifier
    pub payment_type: Option<String>,

    /// Local instrument qualifier
    pub local_instrument_code: Option<String>,

    /// Clearing system qualifier
    pub clearing_system_code: Option<String>,

    /// Payment source qualifier
    pub payment_source: PaymentSource,

    /// Execution style
    pub risk_assessment_type: RiskAssessmentType,

    /// External fraud API, when configured
    pub external_api_config: Option<ExternalApiConfig>,

    /// Risk rules contributing factors and score
    pub risk_rules: Vec<RiskRule>,

    /// Decision criteria over factors and score
    pub decision_criteria: Vec<DecisionCriterion>,

    /// Score cutoffs applied after criteria
    pub thresholds: Option<Thresholds>,

    /// Fallback when the external API fails
    pub fallback_config: Option<FallbackConfig>,

    /// Lower priority applies first
    pub priority: i32,

    /// Disabled configurations are never selected
    pub enabled: bool,

    /// Configuration version
    pub version: u32,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl FraudConfiguration {
    /// Create an enabled configuration with no rules
    pub fn new(configuration_name: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            configuration_name: configuration_name.into(),
            tenant_id: tenant_id.into(),
            payment_type: None,
            local_instrument_code: None,
            clearing_system_code: None,
            payment_source: PaymentSource::Both,
            risk_assessment_type: RiskAssessmentType::RealTime,
            external_api_config: None,
            risk_rules: Vec::new(),
            decision_criteria: Vec::new(),
            thresholds: None,
            fallback_config: None,
            priority: 0,
            enabled: true,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Specificity rank for strictest-first selection
    pub fn specificity(&self) -> u8 {
        let mut rank = 0;
        if self.payment_type.is_some() {
            rank += 1;
        }
        if self.local_instrument_code.is_some() {
            rank += 1;
        }
        if self.clearing_system_code.is_some() {
            rank += 1;
        }
        if self.payment_source != PaymentSource::Both {
            rank += 1;
        }
        rank
    }
}

/// Completed (or in-flight) fraud assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAssessment {
    /// Assessment id
    pub assessment_id: Uuid,

    /// Assessed transaction
    pub transaction_reference: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Lifecycle status
    pub status: AssessmentStatus,

    /// Final risk score in [0.0, 1.0]
    pub risk_score: f64,

    /// Risk level derived from the final score
    pub risk_level: RiskLevel,

    /// Terminal decision; `None` only while the assessment is in flight
    pub decision: Option<Decision>,

    /// Why the decision was made
    pub decision_reason: String,

    /// Risk factors recorded by rules and the external API
    pub risk_factors: Vec<String>,

    /// Provider details carried through from the external API
    pub assessment_details: Value,

    /// External API latency, when one was called
    pub external_api_response_time_ms: Option<u64>,

    /// End-to-end pipeline latency
    pub processing_time_ms: u64,

    /// When the assessment completed
    pub assessed_at: DateTime<Utc>,

    /// Review deadline for suspended decisions
    pub expires_at: Option<DateTime<Utc>>,

    /// Evaluation retries performed
    pub retry_count: u32,
}
