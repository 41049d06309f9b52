//! Resiliency Envelope
//!
//! Composable protection for every outbound call the middleware makes:
//!
//! 1. **Rate limiter**: token bucket per key
//! 2. **Circuit breaker**: sliding-window failure rate with half-open probes
//! 3. **Retry**: exponential backoff with jitter over transient failures
//! 4. **Time limiter**: hard per-attempt timeout with cancellation signal
//! 5. **Bulkhead**: bounded concurrent calls per key
//!
//! plus the queued-message store and the self-healing monitor that replays
//! parked work when a downstream recovers.
//!
//! # Example
//!
//! ```no_run
//! use resiliency::{Envelope, EnvelopeKey, ResiliencyConfigStore, FailureClass};
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct CallFailed;
//! impl std::fmt::Display for CallFailed {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "call failed")
//!     }
//! }
//! impl FailureClass for CallFailed {
//!     fn is_transient(&self) -> bool { true }
//! }
//!
//! # async fn run() {
//! let envelope = Envelope::new(Arc::new(ResiliencyConfigStore::default()));
//! let key = EnvelopeKey::service("core-banking", "demo-bank");
//! let result: Result<u64, _> = envelope
//!     .execute(&key, |_cancel| async { Ok::<_, CallFailed>(42) })
//!     .await;
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod bulkhead;
pub mod circuit_breaker;
pub mod config;
pub mod envelope;
pub mod error;
pub mod healing;
pub mod metrics;
pub mod queue;
pub mod rate_limiter;
pub mod retry;

// Re-exports
pub use bulkhead::Bulkhead;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use config::{
    BulkheadConfig, CircuitBreakerConfig, RateLimiterConfig, ResiliencyConfigStore,
    ResiliencyConfiguration, ResiliencyPolicy, RetryConfig, TimeLimiterConfig,
};
pub use envelope::{Envelope, EnvelopeKey, EnvelopeSnapshot};
pub use error::{CallError, Error, FailureClass, Result};
pub use healing::{
    AutoHealingRules, HealthProbe, MessageDispatcher, MonitoredService, ProbeFailure,
    RecoveryRecord, SelfHealingMonitor, ServiceHealth,
};
pub use metrics::EnvelopeMetrics;
pub use queue::{QueuedMessage, QueuedMessageFilter, QueuedMessageStatus, QueuedMessageStore};
pub use rate_limiter::TokenBucket;
