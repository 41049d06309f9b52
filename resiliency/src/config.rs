//! Envelope policies and the per-key configuration store
//!
//! A [`ResiliencyPolicy`] is a value type combining the five decorator
//! configurations. Policies are resolved per envelope key from a
//! [`ResiliencyConfigStore`], most specific configuration first, with a
//! read-through cache invalidated on write.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failure rate [0.0, 1.0] over the sliding window that opens the circuit
    pub failure_rate_threshold: f64,

    /// Number of recorded outcomes kept in the sliding window
    pub sliding_window_size: usize,

    /// Minimum calls observed before the failure rate is evaluated
    pub minimum_number_of_calls: u32,

    /// How long the circuit stays open before half-opening (milliseconds)
    pub wait_duration_ms: u64,

    /// Probe calls admitted while half-open
    pub permitted_calls_in_half_open: u32,

    /// Successful probes required to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window_size: 20,
            minimum_number_of_calls: 10,
            wait_duration_ms: 30_000,
            permitted_calls_in_half_open: 3,
            success_threshold: 2,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first call
    pub max_attempts: u32,

    /// Base backoff wait (milliseconds)
    pub wait_duration_ms: u64,

    /// Multiplier applied per attempt
    pub exponential_backoff_multiplier: f64,

    /// Cap on a single backoff wait (milliseconds)
    pub max_wait_ms: u64,

    /// Randomize each wait by +/- 50%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_duration_ms: 500,
            exponential_backoff_multiplier: 2.0,
            max_wait_ms: 30_000,
            jitter: true,
        }
    }
}

/// Rate limiter configuration (token bucket)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Tokens added per refill period
    pub limit_for_period: u32,

    /// Refill period (milliseconds)
    pub refill_period_ms: u64,

    /// Bucket capacity; bursts up to this many calls are admitted
    pub burst_capacity: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit_for_period: 100,
            refill_period_ms: 1_000,
            burst_capacity: 100,
        }
    }
}

/// Time limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLimiterConfig {
    /// Hard upper bound on a single attempt (seconds)
    pub timeout_duration_seconds: u64,

    /// Signal the operation's cancellation token on expiry
    pub cancel_running_future: bool,
}

impl Default for TimeLimiterConfig {
    fn default() -> Self {
        Self {
            timeout_duration_seconds: 30,
            cancel_running_future: true,
        }
    }
}

/// Bulkhead configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkheadConfig {
    /// Maximum concurrent in-flight calls through this key
    pub max_concurrent_calls: u32,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 25,
        }
    }
}

/// Value-typed policy combining the full decorator stack.
///
/// Stack order, outermost first:
/// rate limiter -> circuit breaker -> retry -> time limiter -> bulkhead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResiliencyPolicy {
    /// Rate limiter settings
    pub rate_limiter: RateLimiterConfig,

    /// Circuit breaker settings
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry settings
    pub retry: RetryConfig,

    /// Time limiter settings
    pub time_limiter: TimeLimiterConfig,

    /// Bulkhead settings
    pub bulkhead: BulkheadConfig,
}

impl ResiliencyPolicy {
    /// Validate bounds that would otherwise misbehave silently
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.circuit_breaker.failure_rate_threshold) {
            return Err(Error::Config(format!(
                "failure_rate_threshold must be within [0.0, 1.0], got {}",
                self.circuit_breaker.failure_rate_threshold
            )));
        }
        if self.circuit_breaker.sliding_window_size == 0 {
            return Err(Error::Config("sliding_window_size must be > 0".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be > 0".to_string()));
        }
        if self.bulkhead.max_concurrent_calls == 0 {
            return Err(Error::Config("max_concurrent_calls must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Stored resiliency configuration for a (service, tenant, endpoint) scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResiliencyConfiguration {
    /// Downstream service name
    pub service_name: String,

    /// Tenant scope; `None` applies to every tenant
    pub tenant_id: Option<String>,

    /// Endpoint pattern (regex over the endpoint path); `None` matches all
    pub endpoint_pattern: Option<String>,

    /// The policy applied when this configuration matches
    pub policy: ResiliencyPolicy,

    /// Higher priority wins among equally specific matches
    pub priority: i32,

    /// Inactive configurations are never selected
    pub active: bool,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResiliencyConfiguration {
    /// Create an active configuration with default timestamps
    pub fn new(
        service_name: impl Into<String>,
        tenant_id: Option<String>,
        endpoint_pattern: Option<String>,
        policy: ResiliencyPolicy,
        priority: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            service_name: service_name.into(),
            tenant_id,
            endpoint_pattern,
            policy,
            priority,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Specificity rank used during resolution; higher is more specific
    fn specificity(&self) -> u8 {
        match (&self.tenant_id, &self.endpoint_pattern) {
            (Some(_), Some(_)) => 3,
            (Some(_), None) => 2,
            (None, Some(_)) => 1,
            (None, None) => 0,
        }
    }

    fn matches(&self, tenant_id: &str, endpoint: Option<&str>) -> bool {
        if let Some(ref t) = self.tenant_id {
            if t != tenant_id {
                return false;
            }
        }
        if let Some(ref pattern) = self.endpoint_pattern {
            let Some(endpoint) = endpoint else {
                return false;
            };
            match regex::Regex::new(pattern) {
                Ok(re) => {
                    if !re.is_match(endpoint) {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
        true
    }
}

/// Read-through cached store of resiliency configurations.
///
/// Readers resolve without locks; writers invalidate the resolution cache.
pub struct ResiliencyConfigStore {
    /// Configurations grouped by service name
    configs: DashMap<String, Vec<ResiliencyConfiguration>>,

    /// Resolution cache keyed by (service, tenant, endpoint)
    cache: DashMap<(String, String, String), (ResiliencyPolicy, Instant)>,

    /// Cache entry TTL
    cache_ttl: Duration,
}

impl ResiliencyConfigStore {
    /// Create an empty store with the given cache TTL
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            configs: DashMap::new(),
            cache: DashMap::new(),
            cache_ttl,
        }
    }

    /// Register or replace a configuration and invalidate cached resolutions
    pub fn upsert(&self, config: ResiliencyConfiguration) -> Result<()> {
        config.policy.validate()?;

        let mut entry = self.configs.entry(config.service_name.clone()).or_default();
        entry.retain(|c| {
            !(c.tenant_id == config.tenant_id && c.endpoint_pattern == config.endpoint_pattern)
        });
        entry.push(config);
        drop(entry);

        self.cache.clear();
        Ok(())
    }

    /// Explicitly invalidate every cached resolution
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    /// Resolve the policy for an envelope key.
    ///
    /// Most specific active configuration wins; priority breaks ties;
    /// falls back to [`ResiliencyPolicy::default`] when nothing matches.
    pub fn resolve(&self, service_name: &str, tenant_id: &str, endpoint: Option<&str>) -> ResiliencyPolicy {
        let cache_key = (
            service_name.to_string(),
            tenant_id.to_string(),
            endpoint.unwrap_or("").to_string(),
        );

        if let Some(cached) = self.cache.get(&cache_key) {
            let (policy, stored_at) = cached.value();
            if stored_at.elapsed() < self.cache_ttl {
                return policy.clone();
            }
        }

        let policy = self
            .configs
            .get(service_name)
            .and_then(|configs| {
                configs
                    .iter()
                    .filter(|c| c.active && c.matches(tenant_id, endpoint))
                    .max_by_key(|c| (c.specificity(), c.priority))
                    .map(|c| c.policy.clone())
            })
            .unwrap_or_default();

        self.cache.insert(cache_key, (policy.clone(), Instant::now()));
        policy
    }

    /// All configurations registered for a service
    pub fn list(&self, service_name: &str) -> Vec<ResiliencyConfiguration> {
        self.configs
            .get(service_name)
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl Default for ResiliencyConfigStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_validation() {
        let mut policy = ResiliencyPolicy::default();
        assert!(policy.validate().is_ok());

        policy.circuit_breaker.failure_rate_threshold = 1.5;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_most_specific_configuration_wins() {
        let store = ResiliencyConfigStore::default();

        let mut broad = ResiliencyPolicy::default();
        broad.retry.max_attempts = 3;
        store
            .upsert(ResiliencyConfiguration::new("core-banking", None, None, broad, 0))
            .unwrap();

        let mut tenant_scoped = ResiliencyPolicy::default();
        tenant_scoped.retry.max_attempts = 5;
        store
            .upsert(ResiliencyConfiguration::new(
                "core-banking",
                Some("demo-bank".to_string()),
                None,
                tenant_scoped,
                0,
            ))
            .unwrap();

        let resolved = store.resolve("core-banking", "demo-bank", None);
        assert_eq!(resolved.retry.max_attempts, 5);

        let other = store.resolve("core-banking", "other-bank", None);
        assert_eq!(other.retry.max_attempts, 3);
    }

    #[test]
    fn test_endpoint_pattern_match() {
        let store = ResiliencyConfigStore::default();

        let mut scoped = ResiliencyPolicy::default();
        scoped.bulkhead.max_concurrent_calls = 2;
        store
            .upsert(ResiliencyConfiguration::new(
                "core-banking",
                Some("demo-bank".to_string()),
                Some("^/accounts/.*".to_string()),
                scoped,
                0,
            ))
            .unwrap();

        let hit = store.resolve("core-banking", "demo-bank", Some("/accounts/123"));
        assert_eq!(hit.bulkhead.max_concurrent_calls, 2);

        let miss = store.resolve("core-banking", "demo-bank", Some("/transactions/1"));
        assert_eq!(
            miss.bulkhead.max_concurrent_calls,
            BulkheadConfig::default().max_concurrent_calls
        );
    }

    #[test]
    fn test_unknown_service_gets_default_policy() {
        let store = ResiliencyConfigStore::default();
        let policy = store.resolve("unknown", "demo-bank", None);
        assert_eq!(policy.retry.max_attempts, RetryConfig::default().max_attempts);
    }
}
