//! Repair service: lifecycle, optimistic concurrency, queue, statistics

use crate::actions::RepairActionExecutor;
use crate::types::{
    CorrectiveAction, LegStatus, RepairStatus, RepairType, TransactionRepair, HIGH_PRIORITY,
    MAX_PRIORITY, MIN_PRIORITY,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Filter for listing repairs
#[derive(Debug, Clone, Default)]
pub struct RepairFilter {
    /// Restrict to one tenant
    pub tenant_id: Option<String>,

    /// Restrict to one status
    pub status: Option<RepairStatus>,

    /// Restrict to one repair type
    pub repair_type: Option<RepairType>,

    /// Restrict to one operator
    pub assigned_to: Option<String>,

    /// Only repairs at priority >= 8
    pub high_priority_only: bool,
}

/// Aggregate repair statistics for a tenant
#[derive(Debug, Clone, serde::Serialize)]
pub struct RepairStatistics {
    /// All repairs for the tenant
    pub total: usize,

    /// Count per status
    pub by_status: HashMap<RepairStatus, usize>,

    /// Count per repair type
    pub by_type: HashMap<RepairType, usize>,

    /// Repairs at priority >= 8
    pub high_priority: usize,

    /// Mean creation-to-resolution latency over resolved repairs
    pub avg_resolution_ms: f64,
}

/// Repair store and lifecycle engine
pub struct RepairService {
    repairs: DashMap<Uuid, TransactionRepair>,
    executor: RepairActionExecutor,
}

impl RepairService {
    /// Create a service executing actions through the given executor
    pub fn new(executor: RepairActionExecutor) -> Self {
        Self {
            repairs: DashMap::new(),
            executor,
        }
    }

    /// Register a new repair; returns its id
    pub fn create(&self, repair: TransactionRepair) -> Uuid {
        let id = repair.id;
        info!(
            "Repair {} created for {} ({:?}, priority {})",
            id, repair.transaction_reference, repair.repair_type, repair.priority
        );
        self.repairs.insert(id, repair);
        id
    }

    /// Fetch one repair
    pub fn get(&self, id: Uuid) -> Result<TransactionRepair> {
        self.repairs
            .get(&id)
            .map(|r| r.clone())
            .ok_or(Error::UnknownRepair(id))
    }

    /// Assign a repair to an operator (PENDING -> ASSIGNED)
    pub fn assign(&self, id: Uuid, user: &str) -> Result<TransactionRepair> {
        self.mutate(id, None, |repair| {
            Self::transition(repair, RepairStatus::Assigned)?;
            repair.assigned_to = Some(user.to_string());
            repair.push_note(format!("assigned to {}", user));
            Ok(())
        })
    }

    /// Apply a corrective action under an optimistic version check.
    ///
    /// `expected_version` must equal the version the caller read; a
    /// concurrent mutation fails the later caller with `ConflictingRepair`.
    pub async fn apply_corrective_action(
        &self,
        id: Uuid,
        expected_version: u64,
        action: CorrectiveAction,
        details: Option<String>,
        actor: &str,
    ) -> Result<TransactionRepair> {
        // Reserve the repair; the version bump makes the reservation
        // visible to concurrent callers
        let snapshot = self.mutate(id, Some(expected_version), |repair| {
            Self::transition(repair, RepairStatus::InProgress)?;
            repair.corrective_action = Some(action);
            if let Some(ref details) = details {
                repair.push_note(format!("{}: {}", actor, details));
            }
            Ok(())
        })?;

        let outcome = self.executor.execute(&snapshot, action, actor).await?;

        self.mutate(id, None, |repair| {
            if let Some(status) = outcome.debit_status {
                repair.debit_status = status;
            }
            if let Some(status) = outcome.credit_status {
                repair.credit_status = status;
            }
            if let Some(priority) = outcome.priority {
                repair.priority = priority.clamp(MIN_PRIORITY, MAX_PRIORITY);
            }
            for note in &outcome.notes {
                repair.push_note(note);
            }
            if outcome.status == RepairStatus::Pending {
                repair.assigned_to = None;
            }
            if repair.repair_status != outcome.status {
                Self::transition(repair, outcome.status)?;
            }
            if outcome.status.is_terminal() {
                repair.resolved_by = Some(actor.to_string());
                repair.resolved_at = Some(Utc::now());
            }
            Ok(())
        })
    }

    /// Resolve a repair with operator notes
    pub fn resolve(&self, id: Uuid, actor: &str, notes: &str) -> Result<TransactionRepair> {
        self.mutate(id, None, |repair| {
            Self::transition(repair, RepairStatus::Resolved)?;
            repair.push_note(format!("{}: {}", actor, notes));
            repair.resolved_by = Some(actor.to_string());
            repair.resolved_at = Some(Utc::now());
            Ok(())
        })
    }

    /// List repairs, ordered priority descending then created ascending
    pub fn list(&self, filter: &RepairFilter) -> Vec<TransactionRepair> {
        let mut result: Vec<TransactionRepair> = self
            .repairs
            .iter()
            .filter(|e| {
                let r = e.value();
                filter
                    .tenant_id
                    .as_deref()
                    .map(|t| r.tenant_id == t)
                    .unwrap_or(true)
                    && filter.status.map(|s| r.repair_status == s).unwrap_or(true)
                    && filter
                        .repair_type
                        .map(|t| r.repair_type == t)
                        .unwrap_or(true)
                    && filter
                        .assigned_to
                        .as_deref()
                        .map(|u| r.assigned_to.as_deref() == Some(u))
                        .unwrap_or(true)
                    && (!filter.high_priority_only || r.priority >= HIGH_PRIORITY)
            })
            .map(|e| e.value().clone())
            .collect();

        result.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        result
    }

    /// Aggregate statistics for a tenant
    pub fn statistics(&self, tenant_id: &str) -> RepairStatistics {
        let mut by_status: HashMap<RepairStatus, usize> = HashMap::new();
        let mut by_type: HashMap<RepairType, usize> = HashMap::new();
        let mut total = 0;
        let mut high_priority = 0;
        let mut resolved = 0;
        let mut resolution_ms = 0i64;

        for entry in self.repairs.iter() {
            let repair = entry.value();
            if repair.tenant_id != tenant_id {
                continue;
            }
            total += 1;
            *by_status.entry(repair.repair_status).or_default() += 1;
            *by_type.entry(repair.repair_type).or_default() += 1;
            if repair.is_high_priority() {
                high_priority += 1;
            }
            if let Some(resolved_at) = repair.resolved_at {
                resolved += 1;
                resolution_ms += (resolved_at - repair.created_at).num_milliseconds();
            }
        }

        RepairStatistics {
            total,
            by_status,
            by_type,
            high_priority,
            avg_resolution_ms: if resolved > 0 {
                resolution_ms as f64 / resolved as f64
            } else {
                0.0
            },
        }
    }

    /// Repairs whose retry slot is due at `now`
    pub fn due_for_retry(&self, now: DateTime<Utc>) -> Vec<TransactionRepair> {
        self.repairs
            .iter()
            .filter(|e| {
                let r = e.value();
                !r.repair_status.is_terminal()
                    && r.next_retry_at.map(|at| at <= now).unwrap_or(false)
            })
            .map(|e| e.value().clone())
            .collect()
    }

    /// Repairs whose timeout deadline has passed at `now`
    pub fn timed_out(&self, now: DateTime<Utc>) -> Vec<TransactionRepair> {
        self.repairs
            .iter()
            .filter(|e| {
                let r = e.value();
                !r.repair_status.is_terminal()
                    && r.repair_type != RepairType::ManualReview
                    && r.timeout_at.map(|at| at <= now).unwrap_or(false)
            })
            .map(|e| e.value().clone())
            .collect()
    }

    /// Internal mutation helper used by the schedulers
    pub(crate) fn mutate<F>(
        &self,
        id: Uuid,
        expected_version: Option<u64>,
        f: F,
    ) -> Result<TransactionRepair>
    where
        F: FnOnce(&mut TransactionRepair) -> Result<()>,
    {
        let mut entry = self.repairs.get_mut(&id).ok_or(Error::UnknownRepair(id))?;
        let repair = entry.value_mut();

        if let Some(expected) = expected_version {
            if repair.version != expected {
                return Err(Error::ConflictingRepair {
                    id,
                    expected,
                    actual: repair.version,
                });
            }
        }

        f(repair)?;
        repair.version += 1;
        repair.updated_at = Utc::now();
        Ok(repair.clone())
    }

    fn transition(repair: &mut TransactionRepair, to: RepairStatus) -> Result<()> {
        if repair.repair_status.is_terminal() {
            return Err(Error::TerminalState {
                id: repair.id,
                status: repair.repair_status,
            });
        }
        if !repair.repair_status.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: repair.repair_status,
                to,
            });
        }
        repair.repair_status = to;
        Ok(())
    }
}
