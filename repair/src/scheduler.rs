//! Repair schedulers
//!
//! Two interval loops: a retry scheduler (every minute) that reschedules
//! due repairs with exponential backoff `5 * 2^retry_count` minutes, and a
//! timeout sweeper (every five minutes) that converts expired repairs to
//! manual review at priority 8.

use crate::service::RepairService;
use crate::types::{RepairType, HIGH_PRIORITY};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Scheduler cadence and backoff policy
#[derive(Debug, Clone)]
pub struct SchedulerPolicy {
    /// Retry scheduler tick
    pub retry_tick: std::time::Duration,

    /// Timeout sweeper tick
    pub timeout_tick: std::time::Duration,

    /// Base backoff (minutes); delay is `base * 2^retry_count`
    pub backoff_base_minutes: i64,

    /// Cap on a single backoff delay (minutes)
    pub backoff_cap_minutes: i64,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            retry_tick: std::time::Duration::from_secs(60),
            timeout_tick: std::time::Duration::from_secs(300),
            backoff_base_minutes: 5,
            backoff_cap_minutes: 240,
        }
    }
}

/// Background schedulers over the repair store
pub struct RepairScheduler {
    service: Arc<RepairService>,
    policy: SchedulerPolicy,
    shutdown: CancellationToken,
}

impl RepairScheduler {
    /// Create a scheduler
    pub fn new(service: Arc<RepairService>, policy: SchedulerPolicy) -> Self {
        Self {
            service,
            policy,
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn both scheduler loops
    pub fn start(self: Arc<Self>) {
        let retry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(retry.policy.retry_tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = retry.shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        retry.run_retry_tick();
                    }
                }
            }
        });

        let sweeper = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweeper.policy.timeout_tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = sweeper.shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        sweeper.run_timeout_tick();
                    }
                }
            }
        });

        info!(
            "Repair schedulers started (retry {:?}, timeout {:?})",
            self.policy.retry_tick, self.policy.timeout_tick
        );
    }

    /// Stop both loops
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// One retry tick: reschedule every due repair with exponential backoff.
    ///
    /// Repairs that exhaust their budget lose their retry slot and convert
    /// to manual review. Returns the number of repairs touched.
    pub fn run_retry_tick(&self) -> usize {
        let now = Utc::now();
        let due = self.service.due_for_retry(now);
        let mut touched = 0;

        for repair in due {
            let result = self.service.mutate(repair.id, None, |r| {
                if r.retry_count >= r.max_retries {
                    warn!(
                        "Repair {} exhausted {} retries, converting to manual review",
                        r.id, r.retry_count
                    );
                    r.repair_type = RepairType::ManualReview;
                    r.next_retry_at = None;
                    return Ok(());
                }

                let delay = (self.policy.backoff_base_minutes * 2i64.pow(r.retry_count))
                    .min(self.policy.backoff_cap_minutes);
                r.retry_count += 1;
                r.next_retry_at = Some(now + Duration::minutes(delay));
                Ok(())
            });

            if result.is_ok() {
                touched += 1;
            }
        }
        touched
    }

    /// One timeout tick: convert expired repairs to manual review at
    /// priority 8. Returns the number converted.
    pub fn run_timeout_tick(&self) -> usize {
        let now = Utc::now();
        let expired = self.service.timed_out(now);
        let mut converted = 0;

        for repair in expired {
            let result = self.service.mutate(repair.id, None, |r| {
                warn!(
                    "Repair {} timed out at {:?}, converting to manual review",
                    r.id, r.timeout_at
                );
                r.repair_type = RepairType::ManualReview;
                r.priority = HIGH_PRIORITY;
                r.timeout_at = None;
                r.next_retry_at = None;
                r.push_note("timed out awaiting correction, escalated to manual review");
                Ok(())
            });

            if result.is_ok() {
                converted += 1;
            }
        }
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::RepairActionExecutor;
    use crate::types::{RepairStatus, TransactionRepair};
    use banking::InternalAdapter;
    use rust_decimal::Decimal;

    fn fixture() -> (Arc<RepairService>, RepairScheduler) {
        let adapter = Arc::new(InternalAdapter::new("BANK001"));
        let service = Arc::new(RepairService::new(RepairActionExecutor::new(adapter)));
        let scheduler = RepairScheduler::new(service.clone(), SchedulerPolicy::default());
        (service, scheduler)
    }

    fn due_repair() -> TransactionRepair {
        // next_retry_at defaults to now, so the repair is immediately due
        TransactionRepair::new(
            "TXN-1",
            "demo-bank",
            RepairType::CreditTimeout,
            "ACC-100",
            "ACC-200",
            Decimal::new(50000, 2),
            "USD",
            5,
        )
    }

    #[test]
    fn test_first_retry_slot_is_five_minutes() {
        let (service, scheduler) = fixture();
        let id = service.create(due_repair());

        assert_eq!(scheduler.run_retry_tick(), 1);

        let repair = service.get(id).unwrap();
        assert_eq!(repair.retry_count, 1);
        let slot = repair.next_retry_at.unwrap();
        let minutes = (slot - Utc::now()).num_minutes();
        assert!((4..=5).contains(&minutes), "expected ~5m, got {}m", minutes);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let (service, scheduler) = fixture();
        let mut repair = due_repair();
        repair.retry_count = 2;
        repair.max_retries = 20;
        let id = service.create(repair);

        scheduler.run_retry_tick();
        let after = service.get(id).unwrap();
        // 5 * 2^2 = 20 minutes
        let minutes = (after.next_retry_at.unwrap() - Utc::now()).num_minutes();
        assert!((19..=20).contains(&minutes), "expected ~20m, got {}m", minutes);

        // A huge retry count hits the cap
        let mut capped = due_repair();
        capped.transaction_reference = "TXN-2".to_string();
        capped.retry_count = 10;
        capped.max_retries = 20;
        let capped_id = service.create(capped);
        scheduler.run_retry_tick();
        let after = service.get(capped_id).unwrap();
        let minutes = (after.next_retry_at.unwrap() - Utc::now()).num_minutes();
        assert!(minutes <= 240);
    }

    #[test]
    fn test_exhausted_budget_becomes_manual_review() {
        let (service, scheduler) = fixture();
        let mut repair = due_repair();
        repair.retry_count = 3;
        repair.max_retries = 3;
        let id = service.create(repair);

        scheduler.run_retry_tick();
        let after = service.get(id).unwrap();
        assert_eq!(after.repair_type, RepairType::ManualReview);
        assert!(after.next_retry_at.is_none());
    }

    #[test]
    fn test_timeout_tick_converts_to_manual_review() {
        let (service, scheduler) = fixture();
        let mut repair = due_repair();
        repair.timeout_at = Some(Utc::now() - Duration::minutes(1));
        let id = service.create(repair);

        assert_eq!(scheduler.run_timeout_tick(), 1);

        let after = service.get(id).unwrap();
        assert_eq!(after.repair_type, RepairType::ManualReview);
        assert_eq!(after.priority, 8);
        assert_eq!(after.repair_status, RepairStatus::Pending);
        assert!(after.resolution_notes.unwrap().contains("timed out"));
    }

    #[test]
    fn test_terminal_repairs_are_skipped() {
        let (service, scheduler) = fixture();
        let mut repair = due_repair();
        repair.repair_status = RepairStatus::Resolved;
        repair.timeout_at = Some(Utc::now() - Duration::minutes(1));
        service.create(repair);

        assert_eq!(scheduler.run_retry_tick(), 0);
        assert_eq!(scheduler.run_timeout_tick(), 0);
    }
}
