//! End-to-end payment flows against the in-process core.
//!
//! Covers the same-bank sync transfer, cross-bank async clearing, credit
//! timeout repair, fraud rejection, and the circuit-breaker/self-healing
//! cycle, with a fault-injecting adapter wrapped around the internal core.

use async_trait::async_trait;
use banking::{
    AccountInfo, AdapterKind, Capability, CoreBankingAdapter, CreditRequest, DebitRequest,
    HoldRequest, InternalAdapter, TransactionResponse, TransactionStatus, TransferRequest,
};
use fraud::{
    ApiFailure, Decision, ExternalApiConfig, ExternalApiResponse, FraudApiClient, FraudConfigStore,
    FraudConfiguration, FraudPipeline,
};
use banking::{CoreBankingConfigStore, EndpointConfigStore};
use orchestration::{
    endpoint_types, EndpointGate, PaymentInstruction, PaymentOrchestrator,
    PaymentReplayDispatcher, PaymentState, CORE_BANKING_SERVICE,
};
use transform::MappingRegistry;
use repair::{
    LegStatus, RepairActionExecutor, RepairFilter, RepairScheduler, RepairService, RepairType,
    SchedulerPolicy,
};
use resiliency::{
    CircuitState, Envelope, EnvelopeKey, HealthProbe, MonitoredService, ProbeFailure,
    QueuedMessageFilter, QueuedMessageStatus, QueuedMessageStore, ResiliencyConfigStore,
    ResiliencyConfiguration, ResiliencyPolicy, SelfHealingMonitor,
};
use routing::{ClearingSystemConfig, ClearingSystemRegistry, PaymentRoutingRule, RoutingEngine,
    RoutingRuleStore, RoutingType,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use uetr::{UetrGenerator, UetrTrackingService};

const MODE_NORMAL: u8 = 0;
const MODE_TRANSIENT_FAIL: u8 = 1;
const MODE_HANG: u8 = 2;

/// Fault-injecting adapter over the in-process core
struct FaultyAdapter {
    inner: InternalAdapter,
    debit_mode: AtomicU8,
    credit_mode: AtomicU8,
    /// Classify every payment as cross-bank even between local accounts
    force_other_bank: AtomicBool,
}

impl FaultyAdapter {
    fn new() -> Self {
        let inner = InternalAdapter::new("BANK001");
        inner.open_account("ACC-100", "Alice Smith", "USD", Decimal::new(1000000, 2));
        inner.open_account("ACC-200", "Bob Jones", "USD", Decimal::new(500000, 2));
        Self {
            inner,
            debit_mode: AtomicU8::new(MODE_NORMAL),
            credit_mode: AtomicU8::new(MODE_NORMAL),
            force_other_bank: AtomicBool::new(false),
        }
    }

    fn set_debit_mode(&self, mode: u8) {
        self.debit_mode.store(mode, Ordering::SeqCst);
    }

    fn set_credit_mode(&self, mode: u8) {
        self.credit_mode.store(mode, Ordering::SeqCst);
    }

    fn set_force_other_bank(&self, force: bool) {
        self.force_other_bank.store(force, Ordering::SeqCst);
    }

    async fn inject(&self, mode: u8) -> Option<banking::Error> {
        match mode {
            MODE_TRANSIENT_FAIL => Some(banking::Error::Connection(
                "connection refused".to_string(),
            )),
            MODE_HANG => {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Some(banking::Error::Timeout("hung".to_string()))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl CoreBankingAdapter for FaultyAdapter {
    fn adapter_kind(&self) -> AdapterKind {
        AdapterKind::Internal
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn supports(&self, capability: Capability) -> bool {
        self.inner.supports(capability)
    }

    async fn health_check(&self) -> banking::Result<()> {
        if self.debit_mode.load(Ordering::SeqCst) == MODE_NORMAL {
            Ok(())
        } else {
            Err(banking::Error::Connection("unhealthy".to_string()))
        }
    }

    async fn get_account_info(&self, tenant_id: &str, account: &str) -> banking::Result<AccountInfo> {
        self.inner.get_account_info(tenant_id, account).await
    }

    async fn validate_account(&self, tenant_id: &str, account: &str) -> banking::Result<bool> {
        self.inner.validate_account(tenant_id, account).await
    }

    async fn get_account_balance(&self, tenant_id: &str, account: &str) -> banking::Result<Decimal> {
        self.inner.get_account_balance(tenant_id, account).await
    }

    async fn has_sufficient_funds(
        &self,
        tenant_id: &str,
        account: &str,
        amount: Decimal,
        currency: &str,
    ) -> banking::Result<bool> {
        self.inner
            .has_sufficient_funds(tenant_id, account, amount, currency)
            .await
    }

    async fn get_account_holder(&self, tenant_id: &str, account: &str) -> banking::Result<String> {
        self.inner.get_account_holder(tenant_id, account).await
    }

    async fn process_debit(&self, request: &DebitRequest) -> banking::Result<TransactionResponse> {
        if let Some(error) = self.inject(self.debit_mode.load(Ordering::SeqCst)).await {
            return Err(error);
        }
        self.inner.process_debit(request).await
    }

    async fn process_credit(&self, request: &CreditRequest) -> banking::Result<TransactionResponse> {
        if let Some(error) = self.inject(self.credit_mode.load(Ordering::SeqCst)).await {
            return Err(error);
        }
        self.inner.process_credit(request).await
    }

    async fn process_transfer(
        &self,
        request: &TransferRequest,
    ) -> banking::Result<TransactionResponse> {
        self.inner.process_transfer(request).await
    }

    async fn hold_funds(&self, request: &HoldRequest) -> banking::Result<TransactionResponse> {
        self.inner.hold_funds(request).await
    }

    async fn release_funds(
        &self,
        tenant_id: &str,
        hold_reference: &str,
    ) -> banking::Result<TransactionResponse> {
        self.inner.release_funds(tenant_id, hold_reference).await
    }

    async fn get_transaction_status(
        &self,
        tenant_id: &str,
        reference: &str,
    ) -> banking::Result<TransactionStatus> {
        self.inner.get_transaction_status(tenant_id, reference).await
    }

    async fn is_same_bank_payment(
        &self,
        tenant_id: &str,
        from: &str,
        to: &str,
    ) -> banking::Result<bool> {
        if self.force_other_bank.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.is_same_bank_payment(tenant_id, from, to).await
    }

    async fn get_clearing_system_for_payment(
        &self,
        tenant_id: &str,
        payment_type: &str,
        instrument: &str,
    ) -> banking::Result<String> {
        self.inner
            .get_clearing_system_for_payment(tenant_id, payment_type, instrument)
            .await
    }

    async fn get_local_instrumentation_code(
        &self,
        tenant_id: &str,
        payment_type: &str,
    ) -> banking::Result<String> {
        self.inner
            .get_local_instrumentation_code(tenant_id, payment_type)
            .await
    }

    async fn process_iso20022_payment(
        &self,
        tenant_id: &str,
        document: &str,
    ) -> banking::Result<TransactionResponse> {
        self.inner.process_iso20022_payment(tenant_id, document).await
    }

    async fn generate_iso20022_response(
        &self,
        tenant_id: &str,
        original: &str,
        accepted: bool,
    ) -> banking::Result<String> {
        self.inner
            .generate_iso20022_response(tenant_id, original, accepted)
            .await
    }

    async fn validate_iso20022_message(
        &self,
        tenant_id: &str,
        document: &str,
    ) -> banking::Result<bool> {
        self.inner.validate_iso20022_message(tenant_id, document).await
    }
}

/// Probes the adapter's own health endpoint
struct AdapterProbe {
    adapter: Arc<FaultyAdapter>,
}

#[async_trait]
impl HealthProbe for AdapterProbe {
    async fn probe(&self, _service: &MonitoredService) -> Result<(), ProbeFailure> {
        self.adapter
            .health_check()
            .await
            .map_err(|e| ProbeFailure(e.to_string()))
    }
}

/// External fraud API stub with a fixed answer
struct StubFraud {
    response: Result<ExternalApiResponse, ApiFailure>,
}

#[async_trait]
impl FraudApiClient for StubFraud {
    async fn assess(
        &self,
        _config: &ExternalApiConfig,
        _request: &serde_json::Value,
    ) -> Result<ExternalApiResponse, ApiFailure> {
        self.response.clone()
    }
}

struct Fixture {
    adapter: Arc<FaultyAdapter>,
    envelope: Arc<Envelope>,
    queue: Arc<QueuedMessageStore>,
    repairs: Arc<RepairService>,
    fraud_store: Arc<FraudConfigStore>,
    gate: Arc<EndpointGate>,
    rules: Arc<RoutingRuleStore>,
    orchestrator: Arc<PaymentOrchestrator>,
    tracking: Arc<UetrTrackingService>,
}

fn fixture_with_fraud_client(client: Arc<dyn FraudApiClient>) -> Fixture {
    // Fast envelope: one attempt, 1s hard timeout, breaker over 10 calls
    let mut policy = ResiliencyPolicy::default();
    policy.retry.max_attempts = 1;
    policy.retry.wait_duration_ms = 1;
    policy.time_limiter.timeout_duration_seconds = 1;
    policy.circuit_breaker.minimum_number_of_calls = 10;
    policy.circuit_breaker.sliding_window_size = 10;
    policy.circuit_breaker.failure_rate_threshold = 0.5;
    policy.circuit_breaker.wait_duration_ms = 60_000;

    let config_store = Arc::new(ResiliencyConfigStore::default());
    config_store
        .upsert(ResiliencyConfiguration::new(
            CORE_BANKING_SERVICE,
            None,
            None,
            policy,
            0,
        ))
        .unwrap();

    let envelope = Arc::new(Envelope::new(config_store));
    let adapter = Arc::new(FaultyAdapter::new());
    let queue = Arc::new(QueuedMessageStore::new());

    let rules = Arc::new(RoutingRuleStore::new());
    rules.upsert(PaymentRoutingRule::clearing(
        None,
        Some("ACH_CREDIT".to_string()),
        None,
        "ACH",
    ));
    let clearing = Arc::new(ClearingSystemRegistry::new());
    clearing.upsert(ClearingSystemConfig::new(
        "ACH",
        "Automated Clearing House",
        "US",
        "USD",
        "https://ach.example.com/iso20022",
    ));
    let routing = Arc::new(RoutingEngine::new(rules.clone(), clearing, adapter.clone()));

    let fraud_store = Arc::new(FraudConfigStore::new());
    let fraud = Arc::new(FraudPipeline::new(
        fraud_store.clone(),
        client,
        envelope.clone(),
    ));

    let repairs = Arc::new(RepairService::new(RepairActionExecutor::new(adapter.clone())));
    let generator = Arc::new(UetrGenerator::default());
    let tracking = Arc::new(UetrTrackingService::new());
    let gate = Arc::new(EndpointGate::new(
        Arc::new(CoreBankingConfigStore::new()),
        Arc::new(EndpointConfigStore::new()),
        Arc::new(MappingRegistry::new()),
    ));

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        generator,
        tracking.clone(),
        routing,
        fraud,
        adapter.clone(),
        envelope.clone(),
        repairs.clone(),
        queue.clone(),
        gate.clone(),
    ));

    Fixture {
        adapter,
        envelope,
        queue,
        repairs,
        fraud_store,
        gate,
        rules,
        orchestrator,
        tracking,
    }
}

fn fixture() -> Fixture {
    fixture_with_fraud_client(Arc::new(StubFraud {
        response: Ok(ExternalApiResponse::default()),
    }))
}

fn wire(reference: &str) -> PaymentInstruction {
    PaymentInstruction {
        transaction_reference: reference.to_string(),
        tenant_id: "demo-bank".to_string(),
        payment_type: "WIRE_DOMESTIC".to_string(),
        local_instrument_code: "WIRE".to_string(),
        message_type: "pacs.008".to_string(),
        from_account: "ACC-100".to_string(),
        to_account: "ACC-200".to_string(),
        amount: Decimal::new(100000, 2),
        currency: "USD".to_string(),
        narrative: None,
        payment_source: fraud::PaymentSource::BankClient,
        payment_data: json!({}),
        uetr: None,
    }
}

fn ach(reference: &str) -> PaymentInstruction {
    PaymentInstruction {
        payment_type: "ACH_CREDIT".to_string(),
        local_instrument_code: "CCD".to_string(),
        to_account: "EXT-999".to_string(),
        ..wire(reference)
    }
}

#[tokio::test]
async fn same_bank_sync_transfer_settles() {
    let f = fixture();

    let outcome = f.orchestrator.submit_payment(wire("TXN-1000")).await.unwrap();

    assert_eq!(outcome.state, PaymentState::Settled);
    let route = outcome.route.as_ref().unwrap();
    assert_eq!(route.routing_type, RoutingType::SameBank);
    assert_eq!(route.processing_mode, banking::ProcessingMode::Sync);
    assert!(route.clearing_system_code.is_none());

    // Money moved once
    assert_eq!(
        f.adapter
            .get_account_balance("demo-bank", "ACC-100")
            .await
            .unwrap(),
        Decimal::new(900000, 2)
    );
    assert_eq!(
        f.adapter
            .get_account_balance("demo-bank", "ACC-200")
            .await
            .unwrap(),
        Decimal::new(600000, 2)
    );

    // Journey carries the full transition history
    let journey = f.tracking.get_journey(&outcome.uetr).unwrap();
    let statuses: Vec<&str> = journey.iter().map(|r| r.status.as_str()).collect();
    for expected in ["DEBIT_OK", "CREDIT_OK", "SETTLED"] {
        assert!(statuses.contains(&expected), "journey missing {}", expected);
    }

    // No repair record
    assert!(f.repairs.list(&RepairFilter::default()).is_empty());
}

#[tokio::test]
async fn same_bank_resubmission_is_idempotent() {
    let f = fixture();

    let first = f.orchestrator.submit_payment(wire("TXN-1001")).await.unwrap();
    let second = f.orchestrator.submit_payment(wire("TXN-1001")).await.unwrap();

    assert_eq!(first.uetr, second.uetr);
    assert_eq!(second.state, PaymentState::Settled);

    // Only one debit was booked
    assert_eq!(
        f.adapter
            .get_account_balance("demo-bank", "ACC-100")
            .await
            .unwrap(),
        Decimal::new(900000, 2)
    );

    // An incompatible resubmission is a conflict
    let mut altered = wire("TXN-1001");
    altered.amount = Decimal::new(999999, 2);
    assert!(matches!(
        f.orchestrator.submit_payment(altered).await,
        Err(orchestration::Error::Conflict { .. })
    ));
}

#[tokio::test]
async fn cross_bank_async_acks_then_settles_on_callback() {
    let f = fixture();

    let outcome = f.orchestrator.submit_payment(ach("TXN-2000")).await.unwrap();

    // Immediate acknowledgement, not settlement
    assert_eq!(outcome.state, PaymentState::CreditPending);
    let route = outcome.route.as_ref().unwrap();
    assert_eq!(route.routing_type, RoutingType::OtherBank);
    assert_eq!(route.clearing_system_code.as_deref(), Some("ACH"));
    assert_eq!(route.processing_mode, banking::ProcessingMode::Async);
    assert_eq!(route.message_format, banking::MessageFormat::Xml);

    // The pacs.008 is parked for the clearing rail
    let clearing_messages = f.queue.list(&QueuedMessageFilter {
        service_name: Some("clearing:ACH".to_string()),
        ..Default::default()
    });
    assert_eq!(clearing_messages.len(), 1);
    assert!(clearing_messages[0].payload["document"]
        .as_str()
        .unwrap()
        .contains("FIToFICstmrCdtTrf"));

    // The journey shows the outbound clearing hop
    let journey = f.tracking.get_journey(&outcome.uetr).unwrap();
    assert!(journey
        .iter()
        .any(|r| r.status == "PROCESSING" && r.processing_system == "ACH"));

    // Clearing accepts; the payment settles
    let settled = f
        .orchestrator
        .handle_clearing_callback("TXN-2000", true, None)
        .await
        .unwrap();
    assert_eq!(settled.state, PaymentState::Settled);

    let journey = f.tracking.get_journey(&outcome.uetr).unwrap();
    assert!(journey.iter().any(|r| r.status == "SETTLED"));
}

#[tokio::test]
async fn clearing_rejection_creates_credit_repair() {
    let f = fixture();

    f.orchestrator.submit_payment(ach("TXN-2001")).await.unwrap();
    let outcome = f
        .orchestrator
        .handle_clearing_callback("TXN-2001", false, Some("AC04 account closed"))
        .await
        .unwrap();

    assert_eq!(outcome.state, PaymentState::Repairing);
    let repair = f.repairs.get(outcome.repair_id.unwrap()).unwrap();
    assert_eq!(repair.repair_type, RepairType::CreditFailed);
    assert_eq!(repair.debit_status, LegStatus::Success);
    assert_eq!(repair.credit_status, LegStatus::Failed);
    // The booked debit reference is preserved for the operator
    assert!(repair.parent_transaction_id.is_some());
}

#[tokio::test]
async fn credit_timeout_after_debit_produces_repair() {
    let f = fixture();
    f.adapter.set_credit_mode(MODE_HANG);

    let outcome = f.orchestrator.submit_payment(wire("TXN-3000")).await.unwrap();

    assert_eq!(outcome.state, PaymentState::Repairing);
    let repair = f.repairs.get(outcome.repair_id.unwrap()).unwrap();
    assert_eq!(repair.repair_type, RepairType::CreditTimeout);
    assert_eq!(repair.debit_status, LegStatus::Success);
    assert_eq!(repair.credit_status, LegStatus::Timeout);
    assert_eq!(repair.retry_count, 0);
    assert!(repair.priority >= 5);
    assert!(repair.parent_transaction_id.is_some());

    // The retry scheduler books the first slot ~5 minutes out
    let scheduler = RepairScheduler::new(f.repairs.clone(), SchedulerPolicy::default());
    assert_eq!(scheduler.run_retry_tick(), 1);
    let rescheduled = f.repairs.get(repair.id).unwrap();
    let minutes =
        (rescheduled.next_retry_at.unwrap() - chrono::Utc::now()).num_minutes();
    assert!((4..=5).contains(&minutes), "expected ~5m, got {}m", minutes);
}

#[tokio::test]
async fn fraud_reject_short_circuits_orchestration() {
    let f = fixture_with_fraud_client(Arc::new(StubFraud {
        response: Ok(ExternalApiResponse {
            risk_score: Some(0.92),
            risk_level: None,
            decision: Some(Decision::Reject),
            assessment_details: json!({"provider": "acme"}),
        }),
    }));

    let mut config = FraudConfiguration::new("external", "demo-bank");
    config.external_api_config = Some(ExternalApiConfig {
        name: "acme".to_string(),
        url: "https://fraud.example.com/assess".to_string(),
        headers: Default::default(),
        request_template: json!({}),
        timeout_ms: 1_000,
    });
    f.fraud_store.upsert(config);

    let outcome = f.orchestrator.submit_payment(wire("TXN-4000")).await.unwrap();

    assert_eq!(outcome.state, PaymentState::Rejected);
    assert_eq!(outcome.decision, Some(Decision::Reject));

    // No debit was attempted
    assert_eq!(
        f.adapter
            .get_account_balance("demo-bank", "ACC-100")
            .await
            .unwrap(),
        Decimal::new(1000000, 2)
    );

    // Assessment reached CRITICAL; UETR journey ends REJECTED
    let journey = f.tracking.get_journey(&outcome.uetr).unwrap();
    assert_eq!(journey.last().unwrap().status, "REJECTED");
    assert!(f.repairs.list(&RepairFilter::default()).is_empty());
}

#[tokio::test]
async fn circuit_opens_then_self_heal_drains_queue() {
    let f = fixture();
    f.adapter.set_debit_mode(MODE_TRANSIENT_FAIL);

    // Ten consecutive transient failures trip the breaker
    for i in 0..10 {
        let outcome = f
            .orchestrator
            .submit_payment(wire(&format!("TXN-5{:03}", i)))
            .await
            .unwrap();
        assert_eq!(outcome.state, PaymentState::Repairing);
    }

    let key = EnvelopeKey::service(CORE_BANKING_SERVICE, "demo-bank");
    assert_eq!(f.envelope.circuit_state(&key), CircuitState::Open);

    // While the circuit is open, new payments park as PENDING
    let parked = f
        .orchestrator
        .submit_payment(wire("TXN-5900"))
        .await
        .unwrap();
    assert_eq!(parked.state, PaymentState::Queued);
    let pending = f.queue.list(&QueuedMessageFilter {
        status: Some(QueuedMessageStatus::Pending),
        ..Default::default()
    });
    assert_eq!(pending.len(), 1);

    // Downstream recovers; the monitor resets the breaker and drains
    f.adapter.set_debit_mode(MODE_NORMAL);

    let monitor = Arc::new(SelfHealingMonitor::new(
        f.envelope.clone(),
        f.queue.clone(),
        Arc::new(AdapterProbe {
            adapter: f.adapter.clone(),
        }),
        Arc::new(PaymentReplayDispatcher::new(f.orchestrator.clone())),
        std::time::Duration::from_secs(30),
    ));
    monitor.register_service(MonitoredService {
        service_name: CORE_BANKING_SERVICE.to_string(),
        tenant_id: "demo-bank".to_string(),
        health_url: "internal".to_string(),
        rules: Default::default(),
    });

    // First check observes unhealthy state start, then recovery drains
    f.adapter.set_debit_mode(MODE_TRANSIENT_FAIL);
    monitor.perform_health_checks(None).await;
    f.adapter.set_debit_mode(MODE_NORMAL);
    monitor.perform_health_checks(None).await;

    assert_eq!(f.envelope.circuit_state(&key), CircuitState::Closed);

    let replayed = f.orchestrator.get_payment("TXN-5900").unwrap();
    assert_eq!(replayed.state, PaymentState::Settled);

    let still_pending = f.queue.list(&QueuedMessageFilter {
        status: Some(QueuedMessageStatus::Pending),
        ..Default::default()
    });
    assert!(still_pending.is_empty());

    let records = monitor.recovery_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].messages_processed, 1);
}

#[tokio::test]
async fn batch_mode_groups_by_tenant_and_payment_type() {
    let f = fixture();
    // Local accounts, but the core classifies everything cross-bank so
    // the batch routing rules apply
    f.adapter.set_force_other_bank(true);

    let mut ach_batch =
        PaymentRoutingRule::clearing(None, Some("ACH_CREDIT".to_string()), None, "ACH");
    ach_batch.processing_mode = Some(banking::ProcessingMode::Batch);
    ach_batch.priority = 5;
    f.rules.upsert(ach_batch);

    let mut rtp_batch = PaymentRoutingRule::clearing(None, Some("RTP".to_string()), None, "ACH");
    rtp_batch.processing_mode = Some(banking::ProcessingMode::Batch);
    f.rules.upsert(rtp_batch);

    let batched_ach = |reference: &str| PaymentInstruction {
        payment_type: "ACH_CREDIT".to_string(),
        local_instrument_code: "CCD".to_string(),
        ..wire(reference)
    };
    let first = f
        .orchestrator
        .submit_payment(batched_ach("TXN-9000"))
        .await
        .unwrap();
    assert_eq!(first.state, PaymentState::Batched);
    f.orchestrator
        .submit_payment(batched_ach("TXN-9001"))
        .await
        .unwrap();
    f.orchestrator
        .submit_payment(PaymentInstruction {
            payment_type: "RTP".to_string(),
            local_instrument_code: "RTP".to_string(),
            ..wire("TXN-9002")
        })
        .await
        .unwrap();

    // Two groups keyed by (tenant, payment type), members in arrival order
    let groups = f.orchestrator.pending_batches();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].tenant_id, "demo-bank");
    assert_eq!(groups[0].payment_type, "ACH_CREDIT");
    assert_eq!(
        groups[0].transaction_references,
        vec!["TXN-9000".to_string(), "TXN-9001".to_string()]
    );
    assert_eq!(groups[1].payment_type, "RTP");
    assert_eq!(groups[1].transaction_references, vec!["TXN-9002".to_string()]);

    // The window drains every group
    assert_eq!(f.orchestrator.flush_batches().await, 3);
    assert!(f.orchestrator.pending_batches().is_empty());
    for reference in ["TXN-9000", "TXN-9001", "TXN-9002"] {
        assert_eq!(
            f.orchestrator.get_payment(reference).unwrap().state,
            PaymentState::Settled
        );
    }
}

#[tokio::test]
async fn endpoint_validation_blocks_before_any_ledger_effect() {
    let f = fixture();

    // Configure a debit endpoint capping single payments at $5,000
    let core_config = banking::CoreBankingConfig::new(
        "demo-bank",
        "BANK001",
        banking::AdapterKind::Internal,
    );
    let core_config_id = core_config.id;
    f.gate.core_configs().upsert(core_config);
    f.gate.endpoints().upsert(banking::EndpointConfig {
        id: uuid::Uuid::new_v4(),
        core_banking_config_id: core_config_id,
        endpoint_type: endpoint_types::DEBIT.to_string(),
        http_method: "POST".to_string(),
        path: "/transactions/debit".to_string(),
        auth_config: json!({}),
        timeout_ms: None,
        retry_attempts: None,
        circuit_breaker: None,
        rate_limiter: None,
        request_mapping: None,
        response_mapping: None,
        validation_rules: vec![transform::ValidationRule {
            max: Some(5_000.0),
            ..transform::ValidationRule::required("amount")
        }],
        error_handling: json!({}),
        priority: 0,
        active: true,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    });

    let mut over_limit = wire("TXN-8000");
    over_limit.amount = Decimal::new(900000, 2);

    let result = f.orchestrator.submit_payment(over_limit).await;
    assert!(matches!(result, Err(orchestration::Error::Validation(_))));

    // Nothing was booked
    assert_eq!(
        f.adapter
            .get_account_balance("demo-bank", "ACC-100")
            .await
            .unwrap(),
        Decimal::new(1000000, 2)
    );

    // Payments inside the cap still settle
    let ok = f.orchestrator.submit_payment(wire("TXN-8001")).await.unwrap();
    assert_eq!(ok.state, PaymentState::Settled);
}

#[tokio::test]
async fn debit_business_failure_repairs_without_credit() {
    let f = fixture();

    let mut instruction = wire("TXN-6000");
    instruction.amount = Decimal::new(99000000, 2);

    let outcome = f.orchestrator.submit_payment(instruction).await.unwrap();
    assert_eq!(outcome.state, PaymentState::Repairing);

    let repair = f.repairs.get(outcome.repair_id.unwrap()).unwrap();
    assert_eq!(repair.repair_type, RepairType::DebitFailed);
    assert_eq!(repair.debit_status, LegStatus::Failed);
    assert_eq!(repair.credit_status, LegStatus::NotAttempted);

    // Creditor balance untouched
    assert_eq!(
        f.adapter
            .get_account_balance("demo-bank", "ACC-200")
            .await
            .unwrap(),
        Decimal::new(500000, 2)
    );
}

#[tokio::test]
async fn cancel_before_debit_is_clean_cancel_after_debit_repairs() {
    let f = fixture();

    // Park a payment behind an open circuit, then cancel it cleanly
    f.adapter.set_debit_mode(MODE_TRANSIENT_FAIL);
    for i in 0..10 {
        f.orchestrator
            .submit_payment(wire(&format!("TXN-7{:03}", i)))
            .await
            .unwrap();
    }
    let parked = f.orchestrator.submit_payment(wire("TXN-7900")).await.unwrap();
    assert_eq!(parked.state, PaymentState::Queued);

    let cancelled = f.orchestrator.cancel_payment("TXN-7900").await.unwrap();
    assert_eq!(cancelled.state, PaymentState::Cancelled);

    // An ASYNC payment past its debit converts to a repair instead
    f.adapter.set_debit_mode(MODE_NORMAL);
    f.envelope.reset_circuit_breaker(CORE_BANKING_SERVICE, None);

    let acked = f.orchestrator.submit_payment(ach("TXN-7901")).await.unwrap();
    assert_eq!(acked.state, PaymentState::CreditPending);

    let repaired = f.orchestrator.cancel_payment("TXN-7901").await.unwrap();
    assert_eq!(repaired.state, PaymentState::Repairing);
    let repair = f.repairs.get(repaired.repair_id.unwrap()).unwrap();
    assert_eq!(repair.debit_status, LegStatus::Success);
}
