//! Fraud/risk assessment pipeline
//!
//! Applies every matching configuration in order until one produces a
//! terminal decision: risk rules first, then the external API (through the
//! resiliency envelope, with fallback), then decision criteria, then score
//! thresholds. Suspended decisions enter the review queue.

use crate::config::{FraudConfigStore, MatchContext};
use crate::external::{build_request, FraudApiClient};
use crate::rules::{evaluate_criterion, evaluate_rules};
use crate::types::{
    AssessmentStatus, Decision, FraudAssessment, FraudConfiguration, PaymentSource, RiskLevel,
};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use resiliency::{Envelope, EnvelopeKey};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Inputs for one assessment
#[derive(Debug, Clone)]
pub struct AssessmentRequest {
    /// Transaction under assessment
    pub transaction_reference: String,

    /// Requesting tenant
    pub tenant_id: String,

    /// Payment type
    pub payment_type: String,

    /// Local instrument, when known
    pub local_instrument_code: Option<String>,

    /// Clearing system, when known
    pub clearing_system_code: Option<String>,

    /// Where the payment came from
    pub payment_source: PaymentSource,

    /// Canonical payment fields consulted by rules and the external API
    pub payment_data: Value,
}

/// Entry in the manual review queue
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewQueueEntry {
    /// Assessment awaiting review
    pub assessment_id: Uuid,

    /// Transaction under review
    pub transaction_reference: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Decision that parked the payment
    pub decision: Decision,

    /// Queue ordering: higher first
    pub priority: i32,

    /// When the entry was queued
    pub enqueued_at: DateTime<Utc>,

    /// Review deadline
    pub expires_at: DateTime<Utc>,
}

/// The fraud/risk assessment pipeline
pub struct FraudPipeline {
    configs: Arc<FraudConfigStore>,
    client: Arc<dyn FraudApiClient>,
    envelope: Arc<Envelope>,
    assessments: DashMap<Uuid, FraudAssessment>,
    by_reference: DashMap<String, Uuid>,
    review_queue: Mutex<Vec<ReviewQueueEntry>>,
    review_ttl: Duration,
}

impl FraudPipeline {
    /// Create a pipeline
    pub fn new(
        configs: Arc<FraudConfigStore>,
        client: Arc<dyn FraudApiClient>,
        envelope: Arc<Envelope>,
    ) -> Self {
        Self {
            configs,
            client,
            envelope,
            assessments: DashMap::new(),
            by_reference: DashMap::new(),
            review_queue: Mutex::new(Vec::new()),
            review_ttl: Duration::hours(24),
        }
    }

    /// Configuration store backing this pipeline
    pub fn configs(&self) -> &Arc<FraudConfigStore> {
        &self.configs
    }

    /// Run the pipeline for one payment
    pub async fn assess(&self, request: &AssessmentRequest) -> Result<FraudAssessment> {
        let started = Instant::now();
        let assessment_id = Uuid::new_v4();

        let mut assessment = FraudAssessment {
            assessment_id,
            transaction_reference: request.transaction_reference.clone(),
            tenant_id: request.tenant_id.clone(),
            status: AssessmentStatus::InProgress,
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
            decision: None,
            decision_reason: String::new(),
            risk_factors: Vec::new(),
            assessment_details: Value::Null,
            external_api_response_time_ms: None,
            processing_time_ms: 0,
            assessed_at: Utc::now(),
            expires_at: None,
            retry_count: 0,
        };

        let applicable = self.configs.select(&MatchContext {
            tenant_id: &request.tenant_id,
            payment_type: &request.payment_type,
            local_instrument_code: request.local_instrument_code.as_deref(),
            clearing_system_code: request.clearing_system_code.as_deref(),
            payment_source: request.payment_source,
        });

        if applicable.is_empty() {
            assessment.decision = Some(Decision::Approve);
            assessment.decision_reason = "no fraud configuration found".to_string();
            return Ok(self.finalize(assessment, started));
        }

        for config in &applicable {
            self.apply_configuration(config, request, &mut assessment)
                .await;
            if assessment.decision.is_some() {
                // An earlier terminal decision short-circuits later configs
                break;
            }
        }

        if assessment.decision.is_none() {
            assessment.decision = Some(Decision::ManualReview);
            assessment.decision_reason =
                "no configuration produced a terminal decision".to_string();
        }

        Ok(self.finalize(assessment, started))
    }

    async fn apply_configuration(
        &self,
        config: &FraudConfiguration,
        request: &AssessmentRequest,
        assessment: &mut FraudAssessment,
    ) {
        // Risk rules contribute factors and score
        let outcome = evaluate_rules(&config.risk_rules, &request.payment_data);
        assessment.risk_factors.extend(outcome.factors);
        assessment.risk_score = (assessment.risk_score + outcome.score_delta).clamp(0.0, 1.0);

        // External API through the envelope
        if let Some(api) = &config.external_api_config {
            let body = build_request(
                api,
                &request.transaction_reference,
                &request.tenant_id,
                &request.payment_data,
            );
            let key =
                EnvelopeKey::service(format!("fraud-api:{}", api.name), request.tenant_id.as_str());

            let client = self.client.clone();
            let api_config = api.clone();
            let api_started = Instant::now();

            let result = self
                .envelope
                .execute(&key, move |_token| {
                    let client = client.clone();
                    let api_config = api_config.clone();
                    let body = body.clone();
                    async move { client.assess(&api_config, &body).await }
                })
                .await;

            assessment.external_api_response_time_ms =
                Some(api_started.elapsed().as_millis() as u64);

            match result {
                Ok(response) => {
                    if let Some(score) = response.risk_score {
                        assessment.risk_score = score.clamp(0.0, 1.0);
                    }
                    if let Some(level) = response.risk_level {
                        assessment.risk_level = level;
                    }
                    if !response.assessment_details.is_null() {
                        assessment.assessment_details = response.assessment_details;
                    }
                    if let Some(decision) = response.decision {
                        assessment.decision = Some(decision);
                        assessment.decision_reason =
                            format!("external API '{}' decided {:?}", api.name, decision);
                        return;
                    }
                }
                Err(failure) => {
                    warn!(
                        "Fraud API '{}' failed for {}: {}",
                        api.name, request.transaction_reference, failure
                    );
                    match &config.fallback_config {
                        Some(fallback) => {
                            assessment.decision = Some(fallback.decision);
                            assessment.risk_level = fallback.risk_level;
                            assessment.decision_reason = fallback.reason.clone();
                        }
                        None => {
                            assessment.decision = Some(Decision::ManualReview);
                            assessment.decision_reason =
                                format!("external fraud API '{}' unavailable", api.name);
                        }
                    }
                    return;
                }
            }
        }

        // Decision criteria over score and factors
        for criterion in &config.decision_criteria {
            if evaluate_criterion(&criterion.when, assessment.risk_score, &assessment.risk_factors)
            {
                assessment.decision = Some(criterion.decision);
                assessment.decision_reason = criterion.reason.clone();
                return;
            }
        }

        // Score thresholds
        if let Some(thresholds) = &config.thresholds {
            if let Some((decision, reason)) = thresholds.decide(assessment.risk_score) {
                assessment.decision = Some(decision);
                assessment.decision_reason = reason;
            }
        }
    }

    fn finalize(&self, mut assessment: FraudAssessment, started: Instant) -> FraudAssessment {
        assessment.status = AssessmentStatus::Completed;
        assessment.risk_level = match assessment.decision {
            // Fallback-provided levels survive; everything else derives
            // from the final score
            Some(_) if assessment.risk_level > RiskLevel::from_score(assessment.risk_score) => {
                assessment.risk_level
            }
            _ => RiskLevel::from_score(assessment.risk_score),
        };
        assessment.processing_time_ms = started.elapsed().as_millis() as u64;
        assessment.assessed_at = Utc::now();

        let decision = assessment.decision.unwrap_or(Decision::ManualReview);
        if decision.needs_review() {
            assessment.expires_at = Some(Utc::now() + self.review_ttl);
            self.enqueue_review(&assessment, decision);
        }

        info!(
            "Assessment {} for {}: {:?} (score {:.2}, {:?}, {}ms)",
            assessment.assessment_id,
            assessment.transaction_reference,
            decision,
            assessment.risk_score,
            assessment.risk_level,
            assessment.processing_time_ms
        );

        self.by_reference.insert(
            assessment.transaction_reference.clone(),
            assessment.assessment_id,
        );
        self.assessments
            .insert(assessment.assessment_id, assessment.clone());
        assessment
    }

    fn enqueue_review(&self, assessment: &FraudAssessment, decision: Decision) {
        let priority = if decision == Decision::Escalate { 9 } else { 5 };
        self.review_queue.lock().push(ReviewQueueEntry {
            assessment_id: assessment.assessment_id,
            transaction_reference: assessment.transaction_reference.clone(),
            tenant_id: assessment.tenant_id.clone(),
            decision,
            priority,
            enqueued_at: Utc::now(),
            expires_at: assessment
                .expires_at
                .unwrap_or_else(|| Utc::now() + self.review_ttl),
        });
    }

    /// Fetch an assessment by id
    pub fn get(&self, assessment_id: Uuid) -> Result<FraudAssessment> {
        self.assessments
            .get(&assessment_id)
            .map(|a| a.clone())
            .ok_or(Error::UnknownAssessment(assessment_id))
    }

    /// Fetch the latest assessment for a transaction reference
    pub fn get_by_reference(&self, transaction_reference: &str) -> Option<FraudAssessment> {
        self.by_reference
            .get(transaction_reference)
            .and_then(|id| self.assessments.get(&id).map(|a| a.clone()))
    }

    /// All assessments for a tenant
    pub fn list(&self, tenant_id: &str) -> Vec<FraudAssessment> {
        self.assessments
            .iter()
            .filter(|e| e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Review queue ordered priority descending, enqueued ascending
    pub fn review_queue(&self) -> Vec<ReviewQueueEntry> {
        let mut entries = self.review_queue.lock().clone();
        entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.enqueued_at.cmp(&b.enqueued_at))
        });
        entries
    }

    /// Drop expired review entries; returns how many were removed
    pub fn sweep_expired_reviews(&self) -> usize {
        let now = Utc::now();
        let mut queue = self.review_queue.lock();
        let before = queue.len();
        queue.retain(|e| e.expires_at > now);
        before - queue.len()
    }
}
