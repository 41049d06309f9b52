//! Prometheus metrics for envelope observability

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Envelope metrics collector
#[derive(Clone)]
pub struct EnvelopeMetrics {
    /// Completed calls by service and outcome
    pub calls_total: IntCounterVec,

    /// Individual attempts by service
    pub attempts_total: IntCounterVec,

    /// Rejections before the target ran, by service and reason
    pub rejections_total: IntCounterVec,

    /// Call duration histogram by service
    pub call_duration: HistogramVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl EnvelopeMetrics {
    /// Create a metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let calls_total = IntCounterVec::new(
            Opts::new("envelope_calls_total", "Completed enveloped calls"),
            &["service", "outcome"],
        )?;
        registry.register(Box::new(calls_total.clone()))?;

        let attempts_total = IntCounterVec::new(
            Opts::new("envelope_attempts_total", "Individual call attempts"),
            &["service"],
        )?;
        registry.register(Box::new(attempts_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new(
                "envelope_rejections_total",
                "Calls rejected before reaching the target",
            ),
            &["service", "reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let call_duration = HistogramVec::new(
            HistogramOpts::new(
                "envelope_call_duration_seconds",
                "Histogram of enveloped call durations",
            )
            .buckets(vec![0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0]),
            &["service"],
        )?;
        registry.register(Box::new(call_duration.clone()))?;

        Ok(Self {
            calls_total,
            attempts_total,
            rejections_total,
            call_duration,
            registry,
        })
    }

    /// Record a completed call
    pub fn record_call(&self, service: &str, outcome: &str, duration_seconds: f64) {
        self.calls_total.with_label_values(&[service, outcome]).inc();
        self.call_duration
            .with_label_values(&[service])
            .observe(duration_seconds);
    }

    /// Record one attempt
    pub fn record_attempt(&self, service: &str) {
        self.attempts_total.with_label_values(&[service]).inc();
    }

    /// Record a rejection
    pub fn record_rejection(&self, service: &str, reason: &str) {
        self.rejections_total
            .with_label_values(&[service, reason])
            .inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for EnvelopeMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create envelope metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = EnvelopeMetrics::new().unwrap();
        metrics.record_call("core-banking", "success", 0.05);
        metrics.record_rejection("core-banking", "rate_limited");
        metrics.record_attempt("core-banking");

        assert_eq!(
            metrics
                .calls_total
                .with_label_values(&["core-banking", "success"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .rejections_total
                .with_label_values(&["core-banking", "rate_limited"])
                .get(),
            1
        );
    }
}
