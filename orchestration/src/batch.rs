//! Batch dispatch loop
//!
//! BATCH-routed payments park in the orchestrator; on each cadence tick
//! this loop drains them group by group, one
//! [`BatchGroup`](crate::engine::BatchGroup) per (tenant, payment type),
//! members in arrival order, through the synchronous path.

use crate::engine::PaymentOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Background batch dispatcher
pub struct BatchDispatcher {
    orchestrator: Arc<PaymentOrchestrator>,
    cadence: Duration,
    shutdown: CancellationToken,
}

impl BatchDispatcher {
    /// Create a dispatcher with the given cadence
    pub fn new(orchestrator: Arc<PaymentOrchestrator>, cadence: Duration) -> Self {
        Self {
            orchestrator,
            cadence,
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn the dispatch loop
    pub fn start(self: Arc<Self>) {
        let dispatcher = self;
        info!("Batch dispatcher started (cadence {:?})", dispatcher.cadence);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dispatcher.cadence);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = dispatcher.shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let dispatched = dispatcher.orchestrator.flush_batches().await;
                        if dispatched > 0 {
                            info!("Batch window dispatched {} payment(s)", dispatched);
                        }
                    }
                }
            }
        });
    }

    /// Stop the loop
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Flush immediately, outside the cadence
    pub async fn flush_now(&self) -> usize {
        self.orchestrator.flush_batches().await
    }
}
