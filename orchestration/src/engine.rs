//! Debit/credit payment orchestrator
//!
//! Drives the two-phase state machine after a fraud APPROVE: debit through
//! the core banking adapter (wrapped in the resiliency envelope), then
//! credit, with every transition appended to the UETR journey. Partial
//! failures become repair records; an unavailable downstream parks the
//! payment in the queued-message store for the self-healing monitor.
//!
//! Submissions are idempotent on `transaction_reference`: processing for
//! one reference is serialized on a keyed mutex, and resubmissions reuse
//! the recorded in-flight or terminal outcome.

use crate::gate::{endpoint_types, EndpointGate};
use crate::state::PaymentState;
use crate::types::{PaymentInstruction, PaymentOutcome};
use crate::{Error, Result};
use banking::{
    CoreBankingAdapter, CreditRequest, DebitRequest, ErrorKind, Iso20022Codec, TransferRequest,
};
use dashmap::DashMap;
use fraud::{AssessmentRequest, Decision, FraudPipeline};
use repair::{LegStatus, RepairService, RepairType, TransactionRepair};
use resiliency::{CallError, Envelope, EnvelopeKey, QueuedMessage, QueuedMessageStore};
use chrono::{DateTime, Utc};
use routing::{PaymentRoute, RouteContext, RoutingEngine};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uetr::{Direction, UetrGenerator, UetrTrackingRecord, UetrTrackingService};

/// Envelope service name for core banking calls
pub const CORE_BANKING_SERVICE: &str = "core-banking";

/// Queued message type used to park whole payment instructions
pub const PAYMENT_MESSAGE_TYPE: &str = "payment.instruction";

/// Queued message type for outbound clearing documents
pub const CLEARING_MESSAGE_TYPE: &str = "pacs.008";

/// Processing system name recorded in UETR journeys
const SYSTEM_NAME: &str = "payment-orchestrator";

struct PaymentRecord {
    instruction: PaymentInstruction,
    route: Option<PaymentRoute>,
    outcome: PaymentOutcome,
}

/// Payments of one (tenant, payment type) awaiting a batch window
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchGroup {
    /// Owning tenant
    pub tenant_id: String,

    /// Payment type shared by every member
    pub payment_type: String,

    /// Member references, oldest first
    pub transaction_references: Vec<String>,
}

enum LegFailure {
    /// Downstream unavailable before any ledger effect; park and replay later
    Park(String),
    /// Create a repair record
    Repair {
        repair_type: RepairType,
        leg_status: LegStatus,
        priority: i32,
        note: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Leg {
    Debit,
    Credit,
}

/// The payment orchestrator
pub struct PaymentOrchestrator {
    generator: Arc<UetrGenerator>,
    tracking: Arc<UetrTrackingService>,
    routing: Arc<RoutingEngine>,
    fraud: Arc<FraudPipeline>,
    adapter: Arc<dyn CoreBankingAdapter>,
    envelope: Arc<Envelope>,
    repairs: Arc<RepairService>,
    queue: Arc<QueuedMessageStore>,
    gate: Arc<EndpointGate>,
    codec: Iso20022Codec,
    records: DashMap<String, PaymentRecord>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PaymentOrchestrator {
    /// Wire the orchestrator; one instance serves the process
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator: Arc<UetrGenerator>,
        tracking: Arc<UetrTrackingService>,
        routing: Arc<RoutingEngine>,
        fraud: Arc<FraudPipeline>,
        adapter: Arc<dyn CoreBankingAdapter>,
        envelope: Arc<Envelope>,
        repairs: Arc<RepairService>,
        queue: Arc<QueuedMessageStore>,
        gate: Arc<EndpointGate>,
    ) -> Self {
        Self {
            generator,
            tracking,
            routing,
            fraud,
            adapter,
            envelope,
            repairs,
            queue,
            gate,
            codec: Iso20022Codec::new("PAYGRID0"),
            records: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// UETR tracking service backing this orchestrator
    pub fn tracking(&self) -> &Arc<UetrTrackingService> {
        &self.tracking
    }

    /// Submit a payment. Idempotent on `transaction_reference`.
    pub async fn submit_payment(&self, instruction: PaymentInstruction) -> Result<PaymentOutcome> {
        self.validate(&instruction)?;

        let reference = instruction.transaction_reference.clone();
        let lock = self.lock_for(&reference);
        let _guard = lock.lock().await;

        // Idempotency: an existing record answers unless it is still
        // safely re-drivable (no ledger effect yet)
        if let Some(existing) = self.records.get(&reference) {
            if let Some(conflict) = existing.instruction.conflicts_with(&instruction) {
                return Err(Error::Conflict {
                    transaction_reference: reference,
                    reason: conflict,
                });
            }
            if !existing.outcome.state.is_redrivable() {
                return Ok(existing.outcome.clone());
            }
        }

        self.process(instruction).await
    }

    async fn process(&self, instruction: PaymentInstruction) -> Result<PaymentOutcome> {
        let reference = instruction.transaction_reference.clone();
        let resubmission = self.records.contains_key(&reference);

        let uetr = match self.records.get(&reference) {
            Some(record) => record.outcome.uetr.clone(),
            None => match &instruction.uetr {
                Some(provided) => {
                    if !uetr::validate_format(provided) {
                        return Err(Error::Validation(format!("invalid UETR '{}'", provided)));
                    }
                    provided.clone()
                }
                None => self
                    .generator
                    .generate(&instruction.message_type, &instruction.tenant_id),
            },
        };

        if !resubmission {
            let mut outcome = PaymentOutcome::new(&reference, &uetr);
            outcome.message = "received".to_string();
            self.records.insert(
                reference.clone(),
                PaymentRecord {
                    instruction: instruction.clone(),
                    route: None,
                    outcome,
                },
            );
            self.track(&instruction, &uetr, Direction::Inbound, "PENDING", None, SYSTEM_NAME);
        }

        // Fraud gate; a re-driven payment keeps its earlier APPROVE
        let already_approved = self
            .records
            .get(&reference)
            .map(|r| r.outcome.decision == Some(Decision::Approve))
            .unwrap_or(false);

        if !already_approved {
            let assessment = self
                .fraud
                .assess(&AssessmentRequest {
                    transaction_reference: reference.clone(),
                    tenant_id: instruction.tenant_id.clone(),
                    payment_type: instruction.payment_type.clone(),
                    local_instrument_code: Some(instruction.local_instrument_code.clone()),
                    clearing_system_code: None,
                    payment_source: instruction.payment_source,
                    payment_data: instruction.fraud_payload(),
                })
                .await?;

            let decision = assessment.decision.unwrap_or(Decision::ManualReview);
            self.update(&reference, |outcome| {
                outcome.assessment_id = Some(assessment.assessment_id);
                outcome.decision = Some(decision);
            });

            match decision {
                Decision::Approve => {}
                Decision::Reject => {
                    self.track(
                        &instruction,
                        &uetr,
                        Direction::Inbound,
                        "REJECTED",
                        Some(assessment.decision_reason.clone()),
                        SYSTEM_NAME,
                    );
                    return Ok(self.transition(&reference, PaymentState::Rejected, |o| {
                        o.message = format!("rejected by fraud: {}", assessment.decision_reason);
                    }));
                }
                Decision::ManualReview | Decision::Hold | Decision::Escalate => {
                    let status = match decision {
                        Decision::Hold => "HOLD",
                        Decision::Escalate => "ESCALATED",
                        _ => "MANUAL_REVIEW",
                    };
                    self.track(
                        &instruction,
                        &uetr,
                        Direction::Inbound,
                        status,
                        Some(assessment.decision_reason.clone()),
                        SYSTEM_NAME,
                    );
                    return Ok(self.transition(&reference, PaymentState::Suspended, |o| {
                        o.message =
                            format!("suspended for review: {}", assessment.decision_reason);
                    }));
                }
            }
        }

        // Routing
        let route = match self.records.get(&reference).and_then(|r| r.route.clone()) {
            Some(route) => route,
            None => {
                let route = self
                    .routing
                    .route_message(&RouteContext {
                        tenant_id: instruction.tenant_id.clone(),
                        payment_type: instruction.payment_type.clone(),
                        local_instrument_code: instruction.local_instrument_code.clone(),
                        message_type: instruction.message_type.clone(),
                        from_account: Some(instruction.from_account.clone()),
                        to_account: Some(instruction.to_account.clone()),
                    })
                    .await?;
                if let Some(mut record) = self.records.get_mut(&reference) {
                    record.route = Some(route.clone());
                    record.outcome.route = Some(route.clone());
                }
                route
            }
        };

        // Both legs validate against their endpoint configuration before
        // any ledger effect
        self.gate_legs(&instruction, &uetr)?;

        match route.processing_mode {
            banking::ProcessingMode::Sync => self.dispatch_sync(&instruction, &uetr).await,
            banking::ProcessingMode::Async => {
                self.dispatch_async(&instruction, &uetr, &route).await
            }
            banking::ProcessingMode::Batch => {
                info!(
                    "Payment {} batched under ({}, {})",
                    reference, instruction.tenant_id, instruction.payment_type
                );
                self.track(
                    &instruction,
                    &uetr,
                    Direction::Inbound,
                    "BATCHED",
                    None,
                    SYSTEM_NAME,
                );
                Ok(self.transition(&reference, PaymentState::Batched, |o| {
                    o.message = "batched for the next dispatch window".to_string();
                }))
            }
        }
    }

    /// Dispatch both legs synchronously and settle
    async fn dispatch_sync(
        &self,
        instruction: &PaymentInstruction,
        uetr: &str,
    ) -> Result<PaymentOutcome> {
        let reference = &instruction.transaction_reference;

        self.transition(reference, PaymentState::DebitPending, |o| {
            o.message = "debit submitted".to_string();
        });
        self.track(instruction, uetr, Direction::Outbound, "DEBIT_PENDING", None, CORE_BANKING_SERVICE);

        let debit = match self.call_debit(instruction, uetr).await {
            Ok(response) => response,
            Err(failure) => return self.handle_leg_failure(instruction, uetr, Leg::Debit, None, failure),
        };

        self.transition(reference, PaymentState::DebitOk, |o| {
            o.debit_transaction_id = Some(debit.transaction_id.clone());
        });
        self.track(instruction, uetr, Direction::Outbound, "DEBIT_OK", None, CORE_BANKING_SERVICE);

        self.transition(reference, PaymentState::CreditPending, |o| {
            o.message = "credit submitted".to_string();
        });
        self.track(instruction, uetr, Direction::Outbound, "CREDIT_PENDING", None, CORE_BANKING_SERVICE);

        let credit = match self.call_credit(instruction, uetr).await {
            Ok(response) => response,
            Err(failure) => {
                return self.handle_leg_failure(
                    instruction,
                    uetr,
                    Leg::Credit,
                    Some(debit.transaction_id.clone()),
                    failure,
                )
            }
        };

        self.transition(reference, PaymentState::CreditOk, |o| {
            o.credit_transaction_id = Some(credit.transaction_id.clone());
        });
        self.track(instruction, uetr, Direction::Outbound, "CREDIT_OK", None, CORE_BANKING_SERVICE);

        self.track(instruction, uetr, Direction::Outbound, "SETTLED", None, SYSTEM_NAME);
        info!("Payment {} settled (uetr {})", reference, uetr);
        Ok(self.transition(reference, PaymentState::Settled, |o| {
            o.message = "settled".to_string();
        }))
    }

    /// Debit locally, hand the document to the clearing rail, acknowledge.
    /// Settlement completes on the correlated pacs.002 callback.
    async fn dispatch_async(
        &self,
        instruction: &PaymentInstruction,
        uetr: &str,
        route: &PaymentRoute,
    ) -> Result<PaymentOutcome> {
        let reference = &instruction.transaction_reference;

        self.transition(reference, PaymentState::DebitPending, |o| {
            o.message = "debit submitted".to_string();
        });
        self.track(instruction, uetr, Direction::Outbound, "DEBIT_PENDING", None, CORE_BANKING_SERVICE);

        let debit = match self.call_debit(instruction, uetr).await {
            Ok(response) => response,
            Err(failure) => return self.handle_leg_failure(instruction, uetr, Leg::Debit, None, failure),
        };

        self.transition(reference, PaymentState::DebitOk, |o| {
            o.debit_transaction_id = Some(debit.transaction_id.clone());
        });
        self.track(instruction, uetr, Direction::Outbound, "DEBIT_OK", None, CORE_BANKING_SERVICE);

        let clearing_code = route
            .clearing_system_code
            .clone()
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let clearing_service = format!("clearing:{}", clearing_code);

        // Build the pacs.008 and park it for delivery to the scheme
        let document = match route.message_format {
            banking::MessageFormat::Xml => self
                .codec
                .build_pacs008(
                    &self.transfer_request(instruction, uetr),
                    &instruction.tenant_id,
                    &clearing_code,
                )
                .map_err(|e| Error::Internal(e.to_string()))?,
            banking::MessageFormat::Json => {
                serde_json::to_string(&self.transfer_request(instruction, uetr))
                    .map_err(|e| Error::Internal(e.to_string()))?
            }
        };

        let mut message = QueuedMessage::new(
            CLEARING_MESSAGE_TYPE,
            &instruction.tenant_id,
            &clearing_service,
            route.endpoint_url.clone().unwrap_or_default(),
            "POST",
            serde_json::json!({ "document": document }),
            5,
        );
        message.correlation_id = Some(reference.clone());
        self.queue.enqueue(message);

        self.track(
            instruction,
            uetr,
            Direction::Outbound,
            "PROCESSING",
            Some(format!("dispatched via {}", clearing_code)),
            &clearing_code,
        );

        Ok(self.transition(reference, PaymentState::CreditPending, |o| {
            o.message = format!(
                "acknowledged; awaiting clearing callback from {}",
                clearing_code
            );
        }))
    }

    /// Complete an ASYNC payment from the clearing-side status callback,
    /// correlated by transaction reference / end-to-end id.
    pub async fn handle_clearing_callback(
        &self,
        transaction_reference: &str,
        accepted: bool,
        reason: Option<&str>,
    ) -> Result<PaymentOutcome> {
        let lock = self.lock_for(transaction_reference);
        let _guard = lock.lock().await;

        let (instruction, uetr, state, debit_id) = {
            let record = self
                .records
                .get(transaction_reference)
                .ok_or_else(|| Error::UnknownPayment(transaction_reference.to_string()))?;
            (
                record.instruction.clone(),
                record.outcome.uetr.clone(),
                record.outcome.state,
                record.outcome.debit_transaction_id.clone(),
            )
        };

        if state != PaymentState::CreditPending {
            return Err(Error::UnexpectedCallback {
                transaction_reference: transaction_reference.to_string(),
                state: state.to_string(),
            });
        }

        if accepted {
            self.track(&instruction, &uetr, Direction::Inbound, "CREDIT_OK", None, "clearing");
            self.transition(transaction_reference, PaymentState::CreditOk, |o| {
                o.message = "clearing accepted".to_string();
            });
            self.track(&instruction, &uetr, Direction::Outbound, "SETTLED", None, SYSTEM_NAME);
            Ok(self.transition(transaction_reference, PaymentState::Settled, |o| {
                o.message = "settled via clearing".to_string();
            }))
        } else {
            let note = reason.unwrap_or("clearing rejected the transfer").to_string();
            self.handle_leg_failure(
                &instruction,
                &uetr,
                Leg::Credit,
                debit_id,
                LegFailure::Repair {
                    repair_type: RepairType::CreditFailed,
                    leg_status: LegStatus::Failed,
                    priority: 7,
                    note,
                },
            )
        }
    }

    /// Batched payments grouped by (tenant, payment type).
    ///
    /// Groups are ordered by key; members are oldest first so a window
    /// dispatches submissions in arrival order.
    pub fn pending_batches(&self) -> Vec<BatchGroup> {
        let mut groups: BTreeMap<(String, String), Vec<(DateTime<Utc>, String)>> = BTreeMap::new();

        for entry in self.records.iter() {
            let record = entry.value();
            if record.outcome.state != PaymentState::Batched {
                continue;
            }
            groups
                .entry((
                    record.instruction.tenant_id.clone(),
                    record.instruction.payment_type.clone(),
                ))
                .or_default()
                .push((record.outcome.updated_at, entry.key().clone()));
        }

        groups
            .into_iter()
            .map(|((tenant_id, payment_type), mut members)| {
                members.sort_by(|a, b| a.0.cmp(&b.0));
                BatchGroup {
                    tenant_id,
                    payment_type,
                    transaction_references: members.into_iter().map(|(_, r)| r).collect(),
                }
            })
            .collect()
    }

    /// Dispatch one batch window: every (tenant, payment type) group is
    /// drained as a unit, members through the sync path in arrival order.
    /// Returns how many payments were dispatched.
    pub async fn flush_batches(&self) -> usize {
        let mut dispatched = 0;

        for group in self.pending_batches() {
            info!(
                "Dispatching batch group ({}, {}): {} payment(s)",
                group.tenant_id,
                group.payment_type,
                group.transaction_references.len()
            );

            let mut completed = 0;
            for reference in &group.transaction_references {
                let lock = self.lock_for(reference);
                let _guard = lock.lock().await;

                let Some((instruction, uetr)) = self
                    .records
                    .get(reference)
                    .filter(|r| r.outcome.state == PaymentState::Batched)
                    .map(|r| (r.instruction.clone(), r.outcome.uetr.clone()))
                else {
                    continue;
                };

                if self.dispatch_sync(&instruction, &uetr).await.is_ok() {
                    completed += 1;
                }
            }

            info!(
                "Batch group ({}, {}) dispatched {}/{}",
                group.tenant_id,
                group.payment_type,
                completed,
                group.transaction_references.len()
            );
            dispatched += completed;
        }
        dispatched
    }

    /// Cancel a payment.
    ///
    /// Before debit confirmation this is a no-ledger-effect state change;
    /// after a confirmed debit it converts into a repair so nothing is
    /// silently lost.
    pub async fn cancel_payment(&self, transaction_reference: &str) -> Result<PaymentOutcome> {
        let lock = self.lock_for(transaction_reference);
        let _guard = lock.lock().await;

        let (instruction, uetr, state, debit_id) = {
            let record = self
                .records
                .get(transaction_reference)
                .ok_or_else(|| Error::UnknownPayment(transaction_reference.to_string()))?;
            (
                record.instruction.clone(),
                record.outcome.uetr.clone(),
                record.outcome.state,
                record.outcome.debit_transaction_id.clone(),
            )
        };

        match state {
            PaymentState::Init
            | PaymentState::Queued
            | PaymentState::Batched
            | PaymentState::Suspended => {
                self.track(&instruction, &uetr, Direction::Inbound, "CANCELLED", None, SYSTEM_NAME);
                Ok(self.transition(transaction_reference, PaymentState::Cancelled, |o| {
                    o.message = "cancelled before any ledger effect".to_string();
                }))
            }
            PaymentState::DebitOk | PaymentState::CreditPending => self.handle_leg_failure(
                &instruction,
                &uetr,
                Leg::Credit,
                debit_id,
                LegFailure::Repair {
                    repair_type: RepairType::ManualReview,
                    leg_status: LegStatus::NotAttempted,
                    priority: 7,
                    note: "cancelled after debit confirmation".to_string(),
                },
            ),
            other => Err(Error::Conflict {
                transaction_reference: transaction_reference.to_string(),
                reason: format!("cannot cancel in state {}", other),
            }),
        }
    }

    /// Current outcome for a reference
    pub fn get_payment(&self, transaction_reference: &str) -> Result<PaymentOutcome> {
        self.records
            .get(transaction_reference)
            .map(|r| r.outcome.clone())
            .ok_or_else(|| Error::UnknownPayment(transaction_reference.to_string()))
    }

    // Leg execution through the envelope

    async fn call_debit(
        &self,
        instruction: &PaymentInstruction,
        uetr: &str,
    ) -> std::result::Result<banking::TransactionResponse, LegFailure> {
        let request = DebitRequest {
            transaction_reference: instruction.transaction_reference.clone(),
            tenant_id: instruction.tenant_id.clone(),
            account_number: instruction.from_account.clone(),
            amount: instruction.amount,
            currency: instruction.currency.clone(),
            narrative: instruction.narrative.clone(),
            uetr: Some(uetr.to_string()),
        };
        let key = EnvelopeKey::service(CORE_BANKING_SERVICE, instruction.tenant_id.as_str());
        let adapter = self.adapter.clone();

        self.envelope
            .execute(&key, move |_token| {
                let adapter = adapter.clone();
                let request = request.clone();
                async move { adapter.process_debit(&request).await }
            })
            .await
            .map_err(|e| Self::classify(e, Leg::Debit))
    }

    async fn call_credit(
        &self,
        instruction: &PaymentInstruction,
        uetr: &str,
    ) -> std::result::Result<banking::TransactionResponse, LegFailure> {
        let request = CreditRequest {
            transaction_reference: format!("{}-C", instruction.transaction_reference),
            tenant_id: instruction.tenant_id.clone(),
            account_number: instruction.to_account.clone(),
            amount: instruction.amount,
            currency: instruction.currency.clone(),
            narrative: instruction.narrative.clone(),
            uetr: Some(uetr.to_string()),
        };
        let key = EnvelopeKey::service(CORE_BANKING_SERVICE, instruction.tenant_id.as_str());
        let adapter = self.adapter.clone();

        self.envelope
            .execute(&key, move |_token| {
                let adapter = adapter.clone();
                let request = request.clone();
                async move { adapter.process_credit(&request).await }
            })
            .await
            .map_err(|e| Self::classify(e, Leg::Credit))
    }

    fn classify(error: CallError<banking::Error>, leg: Leg) -> LegFailure {
        match error {
            CallError::Envelope(e) => match e {
                resiliency::Error::CircuitOpen { .. } | resiliency::Error::RateLimited { .. } => {
                    LegFailure::Park(e.to_string())
                }
                resiliency::Error::TimedOut { .. }
                | resiliency::Error::DownstreamUnavailable { .. }
                | resiliency::Error::BulkheadFull { .. } => LegFailure::Repair {
                    repair_type: match leg {
                        Leg::Debit => RepairType::DebitTimeout,
                        Leg::Credit => RepairType::CreditTimeout,
                    },
                    leg_status: LegStatus::Timeout,
                    priority: match leg {
                        Leg::Debit => 5,
                        Leg::Credit => 7,
                    },
                    note: e.to_string(),
                },
                other => LegFailure::Repair {
                    repair_type: RepairType::SystemError,
                    leg_status: LegStatus::Failed,
                    priority: 6,
                    note: other.to_string(),
                },
            },
            CallError::Inner(e) => match e.kind() {
                ErrorKind::Business => LegFailure::Repair {
                    repair_type: match leg {
                        Leg::Debit => RepairType::DebitFailed,
                        Leg::Credit => RepairType::CreditFailed,
                    },
                    leg_status: LegStatus::Failed,
                    priority: match leg {
                        Leg::Debit => 5,
                        Leg::Credit => 7,
                    },
                    note: e.to_string(),
                },
                // Transient errors only reach here when the envelope is
                // bypassed; treat like exhausted retries
                ErrorKind::Transient => LegFailure::Repair {
                    repair_type: match leg {
                        Leg::Debit => RepairType::DebitTimeout,
                        Leg::Credit => RepairType::CreditTimeout,
                    },
                    leg_status: LegStatus::Timeout,
                    priority: 6,
                    note: e.to_string(),
                },
                ErrorKind::NotSupported | ErrorKind::Internal => LegFailure::Repair {
                    repair_type: RepairType::SystemError,
                    leg_status: LegStatus::Failed,
                    priority: 6,
                    note: e.to_string(),
                },
            },
        }
    }

    fn handle_leg_failure(
        &self,
        instruction: &PaymentInstruction,
        uetr: &str,
        leg: Leg,
        debit_transaction_id: Option<String>,
        failure: LegFailure,
    ) -> Result<PaymentOutcome> {
        let reference = &instruction.transaction_reference;

        match failure {
            LegFailure::Park(reason) => {
                // Only a not-yet-debited payment may park; a failure after
                // the debit never loses state silently
                debug_assert!(leg == Leg::Debit);
                warn!("Payment {} parked: {}", reference, reason);

                let mut message = QueuedMessage::new(
                    PAYMENT_MESSAGE_TYPE,
                    &instruction.tenant_id,
                    CORE_BANKING_SERVICE,
                    "",
                    "POST",
                    serde_json::to_value(instruction)
                        .map_err(|e| Error::Internal(e.to_string()))?,
                    5,
                );
                message.correlation_id = Some(reference.clone());
                self.queue.enqueue(message);

                self.track(
                    instruction,
                    uetr,
                    Direction::Outbound,
                    "QUEUED",
                    Some(reason.clone()),
                    CORE_BANKING_SERVICE,
                );
                Ok(self.transition(reference, PaymentState::Queued, |o| {
                    o.message = format!("queued: {}", reason);
                }))
            }
            LegFailure::Repair {
                repair_type,
                leg_status,
                priority,
                note,
            } => {
                let mut record = TransactionRepair::new(
                    reference.clone(),
                    instruction.tenant_id.clone(),
                    repair_type,
                    instruction.from_account.clone(),
                    instruction.to_account.clone(),
                    instruction.amount,
                    instruction.currency.clone(),
                    priority,
                );

                match leg {
                    Leg::Debit => {
                        record.debit_status = leg_status;
                        record.credit_status = LegStatus::NotAttempted;
                    }
                    Leg::Credit => {
                        record.debit_status = LegStatus::Success;
                        record.credit_status = leg_status;
                        record.parent_transaction_id = debit_transaction_id;
                    }
                }
                record.push_note(&note);

                let repair_id = self.repairs.create(record);
                warn!(
                    "Payment {} entered repair {} ({:?}): {}",
                    reference, repair_id, repair_type, note
                );

                self.track(
                    instruction,
                    uetr,
                    Direction::Outbound,
                    "REPAIR",
                    Some(note.clone()),
                    SYSTEM_NAME,
                );
                Ok(self.transition(reference, PaymentState::Repairing, |o| {
                    o.repair_id = Some(repair_id);
                    o.message = format!("repair created: {}", note);
                }))
            }
        }
    }

    // Helpers

    fn gate_legs(&self, instruction: &PaymentInstruction, uetr: &str) -> Result<()> {
        for endpoint_type in [endpoint_types::DEBIT, endpoint_types::CREDIT] {
            let gated = self
                .gate
                .check(self.adapter.name(), endpoint_type, instruction);
            if !gated.passed() {
                let detail = gated.violations.join("; ");
                self.track(
                    instruction,
                    uetr,
                    Direction::Outbound,
                    "VALIDATION_FAILED",
                    Some(detail.clone()),
                    SYSTEM_NAME,
                );
                return Err(Error::Validation(format!(
                    "{} endpoint validation failed: {}",
                    endpoint_type, detail
                )));
            }
        }
        Ok(())
    }

    fn validate(&self, instruction: &PaymentInstruction) -> Result<()> {
        if instruction.transaction_reference.trim().is_empty() {
            return Err(Error::Validation("transaction_reference is required".to_string()));
        }
        if instruction.from_account.trim().is_empty() || instruction.to_account.trim().is_empty() {
            return Err(Error::Validation("both accounts are required".to_string()));
        }
        if instruction.amount <= Decimal::ZERO {
            return Err(Error::Validation("amount must be positive".to_string()));
        }
        if instruction.currency.len() != 3 {
            return Err(Error::Validation(format!(
                "invalid currency '{}'",
                instruction.currency
            )));
        }
        Ok(())
    }

    fn lock_for(&self, reference: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(reference.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn transfer_request(&self, instruction: &PaymentInstruction, uetr: &str) -> TransferRequest {
        TransferRequest {
            transaction_reference: instruction.transaction_reference.clone(),
            tenant_id: instruction.tenant_id.clone(),
            from_account: instruction.from_account.clone(),
            to_account: instruction.to_account.clone(),
            amount: instruction.amount,
            currency: instruction.currency.clone(),
            narrative: instruction.narrative.clone(),
            uetr: Some(uetr.to_string()),
        }
    }

    fn transition<F>(&self, reference: &str, next: PaymentState, f: F) -> PaymentOutcome
    where
        F: FnOnce(&mut PaymentOutcome),
    {
        let mut record = self
            .records
            .get_mut(reference)
            .expect("transition on unknown payment");
        let current = record.outcome.state;
        if current != next && !current.can_transition_to(next) {
            // The state table is the authority; a miss here is a bug
            warn!(
                "Illegal payment transition {} -> {} for {}",
                current, next, reference
            );
        }
        record.outcome.state = next;
        record.outcome.updated_at = chrono::Utc::now();
        f(&mut record.outcome);
        record.outcome.clone()
    }

    fn update<F: FnOnce(&mut PaymentOutcome)>(&self, reference: &str, f: F) {
        if let Some(mut record) = self.records.get_mut(reference) {
            f(&mut record.outcome);
            record.outcome.updated_at = chrono::Utc::now();
        }
    }

    fn track(
        &self,
        instruction: &PaymentInstruction,
        uetr: &str,
        direction: Direction,
        status: &str,
        reason: Option<String>,
        system: &str,
    ) {
        self.tracking.record(UetrTrackingRecord::new(
            uetr,
            instruction.message_type.clone(),
            instruction.tenant_id.clone(),
            instruction.transaction_reference.clone(),
            direction,
            status,
            reason,
            system,
        ));
    }
}

/// Replays parked payment instructions when the downstream recovers
pub struct PaymentReplayDispatcher {
    orchestrator: Arc<PaymentOrchestrator>,
}

impl PaymentReplayDispatcher {
    /// Create a dispatcher over the orchestrator
    pub fn new(orchestrator: Arc<PaymentOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait::async_trait]
impl resiliency::MessageDispatcher for PaymentReplayDispatcher {
    async fn dispatch(&self, message: &QueuedMessage) -> std::result::Result<(), String> {
        if message.message_type != PAYMENT_MESSAGE_TYPE {
            return Err(format!(
                "no handler for message type '{}'",
                message.message_type
            ));
        }

        let instruction: PaymentInstruction =
            serde_json::from_value(message.payload.clone()).map_err(|e| e.to_string())?;

        match self.orchestrator.submit_payment(instruction).await {
            Ok(outcome) if outcome.state == PaymentState::Queued => {
                Err(format!("downstream still unavailable: {}", outcome.message))
            }
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }
}
