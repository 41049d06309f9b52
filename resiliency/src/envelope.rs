//! The composed resiliency envelope
//!
//! One [`Envelope`] instance serves the whole process. Each key owns its
//! own rate limiter bucket, circuit breaker, and bulkhead; the decorator
//! stack is applied through a single [`Envelope::execute`] call in the
//! order: rate limiter -> circuit breaker -> retry -> time limiter ->
//! bulkhead -> target.

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::config::{ResiliencyConfigStore, ResiliencyPolicy};
use crate::metrics::EnvelopeMetrics;
use crate::rate_limiter::TokenBucket;
use crate::retry;
use crate::{Bulkhead, CallError, Error, FailureClass};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Identity of one enveloped call path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvelopeKey {
    /// Downstream service name
    pub service_name: String,

    /// Tenant issuing the call
    pub tenant_id: String,

    /// Endpoint path, when per-endpoint policies are configured
    pub endpoint: Option<String>,
}

impl EnvelopeKey {
    /// Key without endpoint scoping
    pub fn service(service_name: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            tenant_id: tenant_id.into(),
            endpoint: None,
        }
    }

    /// Key scoped to one endpoint path
    pub fn endpoint(
        service_name: impl Into<String>,
        tenant_id: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            tenant_id: tenant_id.into(),
            endpoint: Some(endpoint.into()),
        }
    }
}

impl std::fmt::Display for EnvelopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.endpoint {
            Some(endpoint) => write!(f, "{}/{}{}", self.service_name, self.tenant_id, endpoint),
            None => write!(f, "{}/{}", self.service_name, self.tenant_id),
        }
    }
}

/// Per-key decorator state
struct EnvelopeState {
    policy: ResiliencyPolicy,
    bucket: TokenBucket,
    breaker: CircuitBreaker,
    bulkhead: Bulkhead,
}

/// Point-in-time view of one key's envelope state
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnvelopeSnapshot {
    /// Circuit breaker state
    pub circuit_state: CircuitState,

    /// Breaker state transitions since creation
    pub circuit_transitions: u64,

    /// Free bulkhead permits
    pub available_permits: usize,

    /// Rate limiter tokens available
    pub available_tokens: u32,
}

/// Keyed resiliency envelope
pub struct Envelope {
    states: DashMap<EnvelopeKey, Arc<EnvelopeState>>,
    config_store: Arc<ResiliencyConfigStore>,
    metrics: EnvelopeMetrics,
}

impl Envelope {
    /// Create an envelope over a configuration store
    pub fn new(config_store: Arc<ResiliencyConfigStore>) -> Self {
        Self {
            states: DashMap::new(),
            config_store,
            metrics: EnvelopeMetrics::default(),
        }
    }

    /// Envelope metrics
    pub fn metrics(&self) -> &EnvelopeMetrics {
        &self.metrics
    }

    /// Configuration store backing this envelope
    pub fn config_store(&self) -> &Arc<ResiliencyConfigStore> {
        &self.config_store
    }

    /// Execute `op` under the full decorator stack for `key`.
    ///
    /// The operation receives a fresh cancellation token per attempt; the
    /// time limiter signals it when `cancel_running_future` is set.
    /// Transient failures are retried with exponential backoff and recorded
    /// against the circuit breaker; business failures surface immediately
    /// and count as breaker successes (the downstream answered).
    pub async fn execute<T, E, F, Fut>(
        &self,
        key: &EnvelopeKey,
        mut op: F,
    ) -> std::result::Result<T, CallError<E>>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: FailureClass + std::fmt::Display,
    {
        let state = self.state_for(key);
        let policy = state.policy.clone();
        let started = Instant::now();

        if let Err(e) = state.bucket.try_acquire() {
            self.metrics.record_rejection(&key.service_name, "rate_limited");
            return Err(CallError::Envelope(e));
        }

        if let Err(e) = state.breaker.check() {
            self.metrics.record_rejection(&key.service_name, "circuit_open");
            return Err(CallError::Envelope(e));
        }

        let timeout = Duration::from_secs(policy.time_limiter.timeout_duration_seconds);
        let mut last_failure = String::new();

        for attempt in 1..=policy.retry.max_attempts {
            self.metrics.record_attempt(&key.service_name);

            let outcome = match state.bulkhead.try_acquire() {
                Err(e) => Err(CallError::Envelope(e)),
                Ok(_permit) => {
                    let token = CancellationToken::new();
                    match tokio::time::timeout(timeout, op(token.clone())).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(CallError::Inner(e)),
                        Err(_) => {
                            if policy.time_limiter.cancel_running_future {
                                token.cancel();
                            }
                            Err(CallError::Envelope(Error::TimedOut {
                                timeout_ms: timeout.as_millis() as u64,
                            }))
                        }
                    }
                }
            };

            match outcome {
                Ok(value) => {
                    state.breaker.on_result(true);
                    self.metrics
                        .record_call(&key.service_name, "success", started.elapsed().as_secs_f64());
                    return Ok(value);
                }
                Err(CallError::Inner(e)) if !e.is_transient() => {
                    state.breaker.on_result(true);
                    self.metrics.record_call(
                        &key.service_name,
                        "business_failure",
                        started.elapsed().as_secs_f64(),
                    );
                    return Err(CallError::Inner(e));
                }
                Err(failure) => {
                    last_failure = failure.to_string();
                    tracing::debug!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt,
                        policy.retry.max_attempts,
                        key,
                        last_failure
                    );
                    if attempt < policy.retry.max_attempts {
                        tokio::time::sleep(retry::backoff_delay(&policy.retry, attempt)).await;
                    }
                }
            }
        }

        state.breaker.on_result(false);
        self.metrics.record_call(
            &key.service_name,
            "exhausted",
            started.elapsed().as_secs_f64(),
        );
        tracing::warn!(
            "Retry budget exhausted for {} after {} attempts: {}",
            key,
            policy.retry.max_attempts,
            last_failure
        );

        Err(CallError::Envelope(Error::DownstreamUnavailable {
            attempts: policy.retry.max_attempts,
            last_error: last_failure,
        }))
    }

    /// Snapshot the decorator state for a key
    pub fn snapshot(&self, key: &EnvelopeKey) -> EnvelopeSnapshot {
        let state = self.state_for(key);
        EnvelopeSnapshot {
            circuit_state: state.breaker.state(),
            circuit_transitions: state.breaker.transitions(),
            available_permits: state.bulkhead.available(),
            available_tokens: state.bucket.available(),
        }
    }

    /// Current circuit state for a key
    pub fn circuit_state(&self, key: &EnvelopeKey) -> CircuitState {
        self.state_for(key).breaker.state()
    }

    /// Reset every circuit breaker registered under a service (optionally
    /// restricted to one tenant). Returns the number of breakers reset.
    pub fn reset_circuit_breaker(&self, service_name: &str, tenant_id: Option<&str>) -> usize {
        let mut reset = 0;
        for entry in self.states.iter() {
            let key = entry.key();
            if key.service_name != service_name {
                continue;
            }
            if let Some(tenant) = tenant_id {
                if key.tenant_id != tenant {
                    continue;
                }
            }
            entry.value().breaker.reset();
            reset += 1;
        }
        reset
    }

    /// Drop cached per-key state for a service so new policy takes effect
    pub fn invalidate_service(&self, service_name: &str) {
        self.states.retain(|key, _| key.service_name != service_name);
        self.config_store.invalidate();
    }

    fn state_for(&self, key: &EnvelopeKey) -> Arc<EnvelopeState> {
        if let Some(state) = self.states.get(key) {
            return state.clone();
        }

        let policy = self.config_store.resolve(
            &key.service_name,
            &key.tenant_id,
            key.endpoint.as_deref(),
        );
        let label = key.to_string();
        let state = Arc::new(EnvelopeState {
            bucket: TokenBucket::new(label.clone(), policy.rate_limiter.clone()),
            breaker: CircuitBreaker::new(label.clone(), policy.circuit_breaker.clone()),
            bulkhead: Bulkhead::new(label, policy.bulkhead.clone()),
            policy,
        });
        self.states.insert(key.clone(), state.clone());
        state
    }
}
