//! Self-healing monitor
//!
//! Polls downstream health on a fixed tick and, when a service transitions
//! unhealthy -> healthy, resets its circuit breaker, drains its queued
//! messages in priority order, and records recovery metrics.

use crate::envelope::{Envelope, EnvelopeKey};
use crate::error::FailureClass;
use crate::queue::QueuedMessageStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-service auto-healing rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoHealingRules {
    /// Automatic recovery attempts per unhealthy episode
    pub max_recovery_attempts: u32,

    /// Minimum spacing between automatic recoveries (minutes)
    pub recovery_interval_minutes: i64,

    /// Revive permanently failed messages during auto-retry sweeps
    pub auto_retry_enabled: bool,

    /// Retry budget applied to revived messages
    pub max_retry_attempts: u32,

    /// Auto-retry sweep cadence (minutes)
    pub retry_interval_minutes: i64,

    /// Scaling hints, carried as configuration for the deployment layer
    pub auto_scaling_enabled: bool,

    /// Minimum instances when scaling is enabled
    pub min_instances: u32,

    /// Maximum instances when scaling is enabled
    pub max_instances: u32,

    /// CPU threshold percent for scale-out
    pub cpu_threshold: f64,

    /// Memory threshold percent for scale-out
    pub memory_threshold: f64,

    /// Error rate threshold for scale-out
    pub error_rate_threshold: f64,
}

impl Default for AutoHealingRules {
    fn default() -> Self {
        Self {
            max_recovery_attempts: 5,
            recovery_interval_minutes: 5,
            auto_retry_enabled: true,
            max_retry_attempts: 3,
            retry_interval_minutes: 15,
            auto_scaling_enabled: false,
            min_instances: 1,
            max_instances: 4,
            cpu_threshold: 80.0,
            memory_threshold: 80.0,
            error_rate_threshold: 0.25,
        }
    }
}

/// A downstream registered for monitoring
#[derive(Debug, Clone)]
pub struct MonitoredService {
    /// Service name (matches envelope keys and queued messages)
    pub service_name: String,

    /// Tenant the service instance belongs to
    pub tenant_id: String,

    /// Health endpoint URL
    pub health_url: String,

    /// Healing behavior
    pub rules: AutoHealingRules,
}

/// Probe failure reported by a health probe
#[derive(Debug)]
pub struct ProbeFailure(pub String);

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "health probe failed: {}", self.0)
    }
}

impl FailureClass for ProbeFailure {
    fn is_transient(&self) -> bool {
        true
    }
}

/// Health probe contract
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe one service; `Err` marks it unhealthy
    async fn probe(&self, service: &MonitoredService) -> Result<(), ProbeFailure>;
}

/// Redelivery contract for queued messages
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    /// Deliver one queued message to its target
    async fn dispatch(&self, message: &crate::queue::QueuedMessage) -> Result<(), String>;
}

/// Health state tracked per monitored service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    /// Service name
    pub service_name: String,

    /// Tenant
    pub tenant_id: String,

    /// Latest probe verdict
    pub healthy: bool,

    /// Consecutive failed probes
    pub consecutive_failures: u32,

    /// When the current unhealthy episode began
    pub unhealthy_since: Option<DateTime<Utc>>,

    /// Last probe time
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Outcome of one recovery
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryRecord {
    /// Recovered service
    pub service_name: String,

    /// Tenant
    pub tenant_id: String,

    /// When recovery completed
    pub recovered_at: DateTime<Utc>,

    /// Length of the unhealthy episode (milliseconds)
    pub time_to_recover_ms: i64,

    /// Actions taken during recovery
    pub actions: Vec<String>,

    /// Queued messages delivered
    pub messages_processed: usize,

    /// Queued messages that failed again
    pub messages_failed: usize,
}

/// Self-healing monitor over registered downstream services
pub struct SelfHealingMonitor {
    services: DashMap<String, MonitoredService>,
    health: DashMap<String, ServiceHealth>,
    envelope: Arc<Envelope>,
    queue: Arc<QueuedMessageStore>,
    probe: Arc<dyn HealthProbe>,
    dispatcher: Arc<dyn MessageDispatcher>,
    tick: Duration,
    shutdown: CancellationToken,
    recoveries: Mutex<Vec<RecoveryRecord>>,
}

impl SelfHealingMonitor {
    /// Create a monitor; call [`SelfHealingMonitor::start`] to begin polling
    pub fn new(
        envelope: Arc<Envelope>,
        queue: Arc<QueuedMessageStore>,
        probe: Arc<dyn HealthProbe>,
        dispatcher: Arc<dyn MessageDispatcher>,
        tick: Duration,
    ) -> Self {
        Self {
            services: DashMap::new(),
            health: DashMap::new(),
            envelope,
            queue,
            probe,
            dispatcher,
            tick,
            shutdown: CancellationToken::new(),
            recoveries: Mutex::new(Vec::new()),
        }
    }

    /// Register a service for monitoring
    pub fn register_service(&self, service: MonitoredService) {
        let key = Self::key(&service.service_name, &service.tenant_id);
        self.health.insert(
            key.clone(),
            ServiceHealth {
                service_name: service.service_name.clone(),
                tenant_id: service.tenant_id.clone(),
                healthy: true,
                consecutive_failures: 0,
                unhealthy_since: None,
                last_checked_at: None,
            },
        );
        self.services.insert(key, service);
    }

    /// Start the monitoring loop
    pub fn start(self: Arc<Self>) {
        let monitor = self;
        info!("Starting self-healing monitor (tick {:?})", monitor.tick);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = monitor.shutdown.cancelled() => {
                        info!("Self-healing monitor stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        monitor.perform_health_checks(None).await;
                        monitor.queue.sweep_expired();
                    }
                }
            }
        });
    }

    /// Stop the monitoring loop
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Probe every registered service, optionally restricted to one tenant.
    ///
    /// Probes run under a dedicated `<service>:health` envelope key so an
    /// open circuit on the data path cannot mask a recovery.
    pub async fn perform_health_checks(&self, tenant_id: Option<&str>) -> Vec<ServiceHealth> {
        let targets: Vec<MonitoredService> = self
            .services
            .iter()
            .filter(|e| tenant_id.map(|t| e.value().tenant_id == t).unwrap_or(true))
            .map(|e| e.value().clone())
            .collect();

        let mut results = Vec::with_capacity(targets.len());
        for service in targets {
            let healthy = self.probe_service(&service).await;
            results.push(self.observe(&service, healthy).await);
        }
        results
    }

    /// Recover one service: reset its breaker and drain its queue
    pub async fn recover_service(&self, service_name: &str, tenant_id: &str) -> RecoveryRecord {
        info!("Recovering service {} for tenant {}", service_name, tenant_id);
        let mut actions = Vec::new();

        let reset = self
            .envelope
            .reset_circuit_breaker(service_name, Some(tenant_id));
        if reset > 0 {
            actions.push(format!("reset {} circuit breaker(s)", reset));
        }

        let (processed, failed) = self
            .process_queued_messages_for_service(service_name, Some(tenant_id))
            .await;
        actions.push(format!("drained queue: {} ok, {} failed", processed, failed));

        let key = Self::key(service_name, tenant_id);
        let time_to_recover_ms = self
            .health
            .get(&key)
            .and_then(|h| h.unhealthy_since)
            .map(|since| (Utc::now() - since).num_milliseconds())
            .unwrap_or(0);

        let record = RecoveryRecord {
            service_name: service_name.to_string(),
            tenant_id: tenant_id.to_string(),
            recovered_at: Utc::now(),
            time_to_recover_ms,
            actions,
            messages_processed: processed,
            messages_failed: failed,
        };
        self.recoveries.lock().push(record.clone());
        record
    }

    /// Drain claimable queued messages for a service in priority order
    pub async fn process_queued_messages_for_service(
        &self,
        service_name: &str,
        tenant_id: Option<&str>,
    ) -> (usize, usize) {
        let mut processed = 0;
        let mut failed = 0;

        while let Some(message) = self.queue.claim_next(service_name, tenant_id) {
            debug!(
                "Replaying queued message {} to {}",
                message.message_id, message.endpoint_url
            );
            match self.dispatcher.dispatch(&message).await {
                Ok(()) => {
                    let _ = self.queue.mark_processed(message.message_id);
                    processed += 1;
                }
                Err(reason) => {
                    let _ = self.queue.mark_failed(message.message_id, &reason);
                    failed += 1;
                }
            }
        }

        if processed + failed > 0 {
            info!(
                "Queue drain for {}: {} processed, {} failed",
                service_name, processed, failed
            );
        }
        (processed, failed)
    }

    /// Revive permanently failed messages for services with auto-retry
    pub fn auto_retry_failed_operations(&self, tenant_id: Option<&str>) -> usize {
        let enabled = self
            .services
            .iter()
            .any(|e| e.value().rules.auto_retry_enabled);
        if !enabled {
            return 0;
        }
        self.queue.revive_failed(tenant_id)
    }

    /// Force one service's circuit breakers back to CLOSED
    pub fn reset_circuit_breaker(&self, service_name: &str, tenant_id: Option<&str>) -> usize {
        self.envelope.reset_circuit_breaker(service_name, tenant_id)
    }

    /// Current health of every monitored service
    pub fn health_snapshot(&self) -> Vec<ServiceHealth> {
        self.health.iter().map(|e| e.value().clone()).collect()
    }

    /// Recovery history
    pub fn recovery_records(&self) -> Vec<RecoveryRecord> {
        self.recoveries.lock().clone()
    }

    async fn probe_service(&self, service: &MonitoredService) -> bool {
        let key = EnvelopeKey::service(
            format!("{}:health", service.service_name),
            service.tenant_id.clone(),
        );
        let probe = self.probe.clone();
        let target = service.clone();

        self.envelope
            .execute(&key, move |_token| {
                let probe = probe.clone();
                let target = target.clone();
                async move { probe.probe(&target).await }
            })
            .await
            .is_ok()
    }

    async fn observe(&self, service: &MonitoredService, healthy: bool) -> ServiceHealth {
        let key = Self::key(&service.service_name, &service.tenant_id);
        let now = Utc::now();

        let (was_healthy, snapshot) = {
            let mut entry = self.health.entry(key).or_insert_with(|| ServiceHealth {
                service_name: service.service_name.clone(),
                tenant_id: service.tenant_id.clone(),
                healthy: true,
                consecutive_failures: 0,
                unhealthy_since: None,
                last_checked_at: None,
            });
            let state = entry.value_mut();

            let was_healthy = state.healthy;
            state.last_checked_at = Some(now);
            if healthy {
                state.consecutive_failures = 0;
            } else {
                state.consecutive_failures += 1;
                if state.unhealthy_since.is_none() {
                    state.unhealthy_since = Some(now);
                }
                if was_healthy {
                    warn!(
                        "Service {} for tenant {} became unhealthy",
                        service.service_name, service.tenant_id
                    );
                }
            }
            state.healthy = healthy;
            (was_healthy, state.clone())
        };

        if healthy && !was_healthy {
            info!(
                "Service {} for tenant {} recovered",
                service.service_name, service.tenant_id
            );
            self.recover_service(&service.service_name, &service.tenant_id)
                .await;
            if let Some(mut entry) = self.health.get_mut(&Self::key(
                &service.service_name,
                &service.tenant_id,
            )) {
                entry.value_mut().unhealthy_since = None;
            }
        }

        snapshot
    }

    fn key(service_name: &str, tenant_id: &str) -> String {
        format!("{}/{}", service_name, tenant_id)
    }
}
