//! Sliding-window circuit breaker
//!
//! Closed circuits record call outcomes in a count-based sliding window and
//! open once the observed failure rate crosses the configured threshold.
//! Open circuits fail fast until the wait duration elapses, then half-open
//! and admit a limited number of probes.

use crate::config::CircuitBreakerConfig;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation; outcomes are recorded
    Closed,
    /// Failing fast; no calls pass through
    Open,
    /// Probing the downstream with a limited number of calls
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

struct BreakerInner {
    state: CircuitState,
    /// Recent outcomes, `true` = failure
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
    state_changed_at: Instant,
    transitions: u64,
}

/// Circuit breaker for one envelope key
pub struct CircuitBreaker {
    key: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker
    pub fn new(key: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            key: key.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                half_open_in_flight: 0,
                half_open_successes: 0,
                state_changed_at: Instant::now(),
                transitions: 0,
            }),
        }
    }

    /// Check whether a call may proceed.
    ///
    /// In half-open state a permitted probe slot is reserved; the caller
    /// must report the outcome via [`CircuitBreaker::on_result`].
    pub fn check(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed_ms = inner
                .opened_at
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0);

            if elapsed_ms >= self.config.wait_duration_ms {
                tracing::info!("Circuit breaker half-opening for {}", self.key);
                Self::transition(&mut inner, CircuitState::HalfOpen);
                inner.half_open_in_flight = 0;
                inner.half_open_successes = 0;
            } else {
                return Err(Error::CircuitOpen {
                    key: self.key.clone(),
                    retry_after_ms: self.config.wait_duration_ms - elapsed_ms,
                });
            }
        }

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.permitted_calls_in_half_open {
                    inner.half_open_in_flight += 1;
                    Ok(())
                } else {
                    Err(Error::CircuitOpen {
                        key: self.key.clone(),
                        retry_after_ms: self.config.wait_duration_ms,
                    })
                }
            }
            CircuitState::Open => unreachable!("open state handled above"),
        }
    }

    /// Record the outcome of a call admitted by [`CircuitBreaker::check`]
    pub fn on_result(&self, success: bool) {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.window.push_back(!success);
                while inner.window.len() > self.config.sliding_window_size {
                    inner.window.pop_front();
                }

                if self.should_open(&inner) {
                    tracing::warn!(
                        "Circuit breaker opening for {} (failure rate over {} calls)",
                        self.key,
                        inner.window.len()
                    );
                    Self::transition(&mut inner, CircuitState::Open);
                    inner.opened_at = Some(Instant::now());
                    inner.window.clear();
                }
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);

                if success {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.config.success_threshold {
                        tracing::info!("Circuit breaker closing for {}", self.key);
                        Self::transition(&mut inner, CircuitState::Closed);
                        inner.window.clear();
                        inner.opened_at = None;
                    }
                } else {
                    tracing::warn!("Circuit breaker re-opening for {}", self.key);
                    Self::transition(&mut inner, CircuitState::Open);
                    inner.opened_at = Some(Instant::now());
                }
            }
            // Late results after a forced transition are dropped
            CircuitState::Open => {}
        }
    }

    /// Force the breaker back to closed (manual or self-heal reset)
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        tracing::info!("Circuit breaker reset to CLOSED for {}", self.key);
        Self::transition(&mut inner, CircuitState::Closed);
        inner.window.clear();
        inner.opened_at = None;
        inner.half_open_in_flight = 0;
        inner.half_open_successes = 0;
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Total state transitions since creation
    pub fn transitions(&self) -> u64 {
        self.inner.lock().transitions
    }

    fn should_open(&self, inner: &BreakerInner) -> bool {
        let observed = inner.window.len() as u32;
        if observed < self.config.minimum_number_of_calls {
            return false;
        }
        let failures = inner.window.iter().filter(|f| **f).count() as f64;
        failures / inner.window.len() as f64 >= self.config.failure_rate_threshold
    }

    fn transition(inner: &mut BreakerInner, to: CircuitState) {
        if inner.state != to {
            inner.state = to;
            inner.state_changed_at = Instant::now();
            inner.transitions += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_calls: u32, wait_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: 0.5,
            sliding_window_size: 10,
            minimum_number_of_calls: min_calls,
            wait_duration_ms: wait_ms,
            permitted_calls_in_half_open: 2,
            success_threshold: 2,
        }
    }

    #[test]
    fn test_opens_on_failure_rate() {
        let cb = CircuitBreaker::new("core-banking", config(10, 60_000));

        // Nine failures are below the minimum call count
        for _ in 0..9 {
            cb.check().unwrap();
            cb.on_result(false);
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        // Tenth failure crosses both minimum and threshold
        cb.check().unwrap();
        cb.on_result(false);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.check().is_err());
    }

    #[test]
    fn test_stays_closed_below_threshold() {
        let cb = CircuitBreaker::new("core-banking", config(10, 60_000));

        for i in 0..20 {
            cb.check().unwrap();
            // One failure in five keeps the rate at 20%
            cb.on_result(i % 5 != 0);
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_probe_cycle() {
        let cb = CircuitBreaker::new("core-banking", config(4, 0));

        for _ in 0..4 {
            cb.check().unwrap();
            cb.on_result(false);
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // wait_duration_ms = 0: next check half-opens immediately
        cb.check().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.on_result(true);

        cb.check().unwrap();
        cb.on_result(true);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new("core-banking", config(4, 0));

        for _ in 0..4 {
            cb.check().unwrap();
            cb.on_result(false);
        }

        cb.check().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.on_result(false);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_limits_probes() {
        let cb = CircuitBreaker::new("core-banking", config(4, 0));

        for _ in 0..4 {
            cb.check().unwrap();
            cb.on_result(false);
        }

        // Two probe slots configured
        cb.check().unwrap();
        cb.check().unwrap();
        assert!(cb.check().is_err());
    }

    #[test]
    fn test_reset_forces_closed() {
        let cb = CircuitBreaker::new("core-banking", config(4, 60_000));

        for _ in 0..4 {
            cb.check().unwrap();
            cb.on_result(false);
        }
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.check().is_ok());
    }
}
