//! Exponential backoff calculation for the retry decorator

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Compute the wait before the next attempt.
///
/// `attempt` is 1-based (the attempt that just failed). Backoff grows as
/// `wait_duration * multiplier^(attempt-1)`, capped at `max_wait_ms`, with
/// optional +/- 50% jitter.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let base = config.wait_duration_ms as f64
        * config.exponential_backoff_multiplier.powi(exponent);
    let capped = base.min(config.max_wait_ms as f64);

    let with_jitter = if config.jitter {
        let mut rng = rand::thread_rng();
        let factor: f64 = rng.gen_range(0.5..=1.5);
        capped * factor
    } else {
        capped
    };

    Duration::from_millis(with_jitter.max(0.0) as u64)
}
