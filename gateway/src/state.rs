//! Shared application state and the composition root
//!
//! Every component is constructed exactly once and passed down as an
//! interface; state lives in the component, not in ambient context.

use crate::config::{AdapterTransport, GatewayConfig};
use banking::{CoreBankingAdapter, GrpcAdapter, InternalAdapter, RestAdapter};
use fraud::{FraudConfigStore, FraudPipeline, HttpFraudApiClient};
use banking::{CoreBankingConfigStore, EndpointConfigStore};
use orchestration::{
    BatchDispatcher, EndpointGate, PaymentOrchestrator, PaymentReplayDispatcher,
    CORE_BANKING_SERVICE,
};
use transform::MappingRegistry;
use repair::{RepairActionExecutor, RepairScheduler, RepairService, SchedulerPolicy};
use resiliency::{
    AutoHealingRules, Envelope, MessageDispatcher, MonitoredService, QueuedMessage,
    QueuedMessageStore, ResiliencyConfigStore, SelfHealingMonitor,
};
use routing::{ClearingSystemConfig, ClearingSystemRegistry, PaymentRoutingRule, RoutingEngine,
    RoutingRuleStore,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared handles for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// UETR generation
    pub generator: Arc<uetr::UetrGenerator>,

    /// UETR tracking and journeys
    pub tracking: Arc<uetr::UetrTrackingService>,

    /// Routing engine
    pub routing: Arc<RoutingEngine>,

    /// Fraud pipeline
    pub fraud: Arc<FraudPipeline>,

    /// Fraud configuration store
    pub fraud_configs: Arc<FraudConfigStore>,

    /// Payment orchestrator
    pub orchestrator: Arc<PaymentOrchestrator>,

    /// Repair service
    pub repairs: Arc<RepairService>,

    /// Queued message store
    pub queue: Arc<QueuedMessageStore>,

    /// Resiliency envelope
    pub envelope: Arc<Envelope>,

    /// Self-healing monitor
    pub monitor: Arc<SelfHealingMonitor>,

    /// Endpoint configuration and payload-mapping gate
    pub gate: Arc<EndpointGate>,
}

/// Long-running background workers owned by the composition root
pub struct Background {
    /// Self-healing monitor (also reachable from state)
    pub monitor: Arc<SelfHealingMonitor>,

    /// Repair schedulers
    pub repair_scheduler: Arc<RepairScheduler>,

    /// Batch dispatch loop
    pub batch_dispatcher: Arc<BatchDispatcher>,
}

impl Background {
    /// Spawn every background loop
    pub fn start(&self) {
        self.monitor.clone().start();
        self.repair_scheduler.clone().start();
        self.batch_dispatcher.clone().start();
    }

    /// Stop every background loop
    pub fn stop(&self) {
        self.monitor.stop();
        self.repair_scheduler.stop();
        self.batch_dispatcher.stop();
    }
}

/// Delivers parked messages: payment instructions replay through the
/// orchestrator, clearing documents post to their endpoint over HTTP.
struct GatewayDispatcher {
    replay: PaymentReplayDispatcher,
    http: reqwest::Client,
}

#[async_trait::async_trait]
impl MessageDispatcher for GatewayDispatcher {
    async fn dispatch(&self, message: &QueuedMessage) -> Result<(), String> {
        match message.message_type.as_str() {
            orchestration::PAYMENT_MESSAGE_TYPE => self.replay.dispatch(message).await,
            _ => {
                if message.endpoint_url.is_empty() {
                    return Err("message has no endpoint".to_string());
                }
                let response = self
                    .http
                    .post(&message.endpoint_url)
                    .json(&message.payload)
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(format!("endpoint returned {}", response.status()))
                }
            }
        }
    }
}

/// Probes a service's health URL over HTTP
struct HttpProbe {
    client: reqwest::Client,
    adapter: Arc<dyn CoreBankingAdapter>,
}

#[async_trait::async_trait]
impl resiliency::HealthProbe for HttpProbe {
    async fn probe(
        &self,
        service: &MonitoredService,
    ) -> Result<(), resiliency::ProbeFailure> {
        // The core adapter answers its own health; everything else is an
        // HTTP health endpoint
        if service.service_name == CORE_BANKING_SERVICE {
            return self
                .adapter
                .health_check()
                .await
                .map_err(|e| resiliency::ProbeFailure(e.to_string()));
        }

        let response = self
            .client
            .get(&service.health_url)
            .send()
            .await
            .map_err(|e| resiliency::ProbeFailure(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(resiliency::ProbeFailure(format!(
                "health endpoint returned {}",
                response.status()
            )))
        }
    }
}

/// Build the whole middleware from configuration
pub fn build(config: &GatewayConfig) -> anyhow::Result<(AppState, Background)> {
    let resiliency_configs = Arc::new(ResiliencyConfigStore::default());
    let envelope = Arc::new(Envelope::new(resiliency_configs));
    let queue = Arc::new(QueuedMessageStore::new());

    let adapter: Arc<dyn CoreBankingAdapter> = match config.adapter.transport {
        AdapterTransport::Internal => {
            let internal = Arc::new(InternalAdapter::new(config.adapter.bank_code.clone()));
            if config.seed_demo {
                seed_accounts(&internal);
            }
            internal
        }
        AdapterTransport::Rest => Arc::new(RestAdapter::new(
            CORE_BANKING_SERVICE,
            config
                .adapter
                .base_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("rest adapter requires adapter.base_url"))?,
            config.adapter.timeout_ms,
            banking::AuthMethod::None,
            None,
        )?),
        AdapterTransport::Grpc => Arc::new(GrpcAdapter::new(
            CORE_BANKING_SERVICE,
            config
                .adapter
                .base_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("grpc adapter requires adapter.base_url"))?,
        )?),
    };

    let rules = Arc::new(RoutingRuleStore::new());
    let clearing = Arc::new(ClearingSystemRegistry::new());
    if config.seed_demo {
        seed_routing(&rules, &clearing);
    }
    let routing = Arc::new(RoutingEngine::new(rules, clearing, adapter.clone()));

    let fraud_configs = Arc::new(FraudConfigStore::new());
    let fraud = Arc::new(FraudPipeline::new(
        fraud_configs.clone(),
        Arc::new(HttpFraudApiClient::new()),
        envelope.clone(),
    ));

    let repairs = Arc::new(RepairService::new(RepairActionExecutor::new(adapter.clone())));
    let generator = Arc::new(uetr::UetrGenerator::new(config.system_id.clone()));
    let tracking = Arc::new(uetr::UetrTrackingService::new());
    let gate = Arc::new(EndpointGate::new(
        Arc::new(CoreBankingConfigStore::new()),
        Arc::new(EndpointConfigStore::new()),
        Arc::new(MappingRegistry::new()),
    ));

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        generator.clone(),
        tracking.clone(),
        routing.clone(),
        fraud.clone(),
        adapter.clone(),
        envelope.clone(),
        repairs.clone(),
        queue.clone(),
        gate.clone(),
    ));

    let dispatcher = Arc::new(GatewayDispatcher {
        replay: PaymentReplayDispatcher::new(orchestrator.clone()),
        http: reqwest::Client::new(),
    });
    let probe = Arc::new(HttpProbe {
        client: reqwest::Client::new(),
        adapter: adapter.clone(),
    });

    let monitor = Arc::new(SelfHealingMonitor::new(
        envelope.clone(),
        queue.clone(),
        probe,
        dispatcher,
        Duration::from_secs(config.monitor_interval_secs),
    ));
    monitor.register_service(MonitoredService {
        service_name: CORE_BANKING_SERVICE.to_string(),
        tenant_id: "demo-bank".to_string(),
        health_url: config
            .adapter
            .base_url
            .clone()
            .map(|base| format!("{}/health", base))
            .unwrap_or_default(),
        rules: AutoHealingRules::default(),
    });

    let repair_scheduler = Arc::new(RepairScheduler::new(
        repairs.clone(),
        SchedulerPolicy::default(),
    ));
    let batch_dispatcher = Arc::new(BatchDispatcher::new(
        orchestrator.clone(),
        Duration::from_secs(config.batch_cadence_secs),
    ));

    info!(
        "PayGrid composed (adapter {:?}, seed_demo {})",
        config.adapter.transport, config.seed_demo
    );

    Ok((
        AppState {
            generator,
            tracking,
            routing,
            fraud,
            fraud_configs,
            orchestrator,
            repairs,
            queue,
            envelope,
            monitor: monitor.clone(),
            gate,
        },
        Background {
            monitor,
            repair_scheduler,
            batch_dispatcher,
        },
    ))
}

fn seed_accounts(adapter: &InternalAdapter) {
    adapter.open_account("ACC-100", "Alice Smith", "USD", Decimal::new(100000000, 2));
    adapter.open_account("ACC-200", "Bob Jones", "USD", Decimal::new(50000000, 2));
    adapter.open_account("ACC-300", "Carol White", "USD", Decimal::new(25000000, 2));
    info!("Seeded demo accounts at BANK001");
}

fn seed_routing(rules: &RoutingRuleStore, clearing: &ClearingSystemRegistry) {
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
    clearing.upsert(ClearingSystemConfig::new(
        "RTP",
        "Real-Time Payments",
        "US",
        "USD",
        "https://rtp.example.com/iso20022",
    ));

    rules.upsert(PaymentRoutingRule::clearing(
        None,
        Some("ACH_CREDIT".to_string()),
        None,
        "ACH",
    ));
    rules.upsert(PaymentRoutingRule::clearing(
        None,
        Some("WIRE_INTERNATIONAL".to_string()),
        None,
        "FEDWIRE",
    ));
    rules.upsert(PaymentRoutingRule::clearing(
        None,
        None,
        Some("RTP".to_string()),
        "RTP",
    ));
    rules.set_default(PaymentRoutingRule::clearing(None, None, None, "FEDWIRE"));
    info!("Seeded demo clearing systems and routing rules");
}
