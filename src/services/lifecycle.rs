//! Cycle lifecycle: opening, locking for share-out, completion.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Cycle, CycleStatus};
use crate::error::{VslaError, VslaResult};
use crate::ports::{CycleLockOutcome, LedgerRepository};

pub struct CycleLifecycle {
    repo: Arc<dyn LedgerRepository>,
}

impl CycleLifecycle {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        Self { repo }
    }

    pub async fn open_cycle(
        &self,
        tenant_id: Uuid,
        name: String,
        start_date: DateTime<Utc>,
    ) -> VslaResult<Cycle> {
        let cycle = Cycle::new(tenant_id, name, start_date);
        let inserted = self.repo.insert_cycle(&cycle).await?;
        tracing::info!(cycle_id = %inserted.id, name = %inserted.name, "opened cycle");
        Ok(inserted)
    }

    /// Lock an active cycle for share-out: set the end date, recompute the
    /// aggregates one final time and freeze them on the cycle row. The
    /// recompute-and-freeze runs as one atomic repository operation, so an
    /// approval in flight either lands before the freeze and is counted, or
    /// is refused. From here on the ledger is immutable and the frozen
    /// totals are authoritative.
    pub async fn lock_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        end_date: Option<DateTime<Utc>>,
    ) -> VslaResult<Cycle> {
        let cycle = self.repo.cycle_by_id(tenant_id, cycle_id).await?;
        if !cycle.status.can_transition_to(CycleStatus::Locked) {
            return Err(VslaError::InvalidTransition(format!(
                "cycle {} is {} and cannot be locked",
                cycle.id, cycle.status
            )));
        }

        // start_date never changes after open, so this check is safe outside
        // the atomic lock.
        let end_date = end_date.unwrap_or_else(Utc::now);
        if end_date < cycle.start_date {
            return Err(VslaError::InvalidTransition(format!(
                "end date {} precedes start date {}",
                end_date, cycle.start_date
            )));
        }

        match self.repo.lock_cycle(tenant_id, cycle_id, end_date).await? {
            CycleLockOutcome::Locked(updated) => {
                tracing::info!(
                    cycle_id = %updated.id,
                    available = %updated.total_available_for_shareout,
                    "locked cycle for share-out"
                );
                Ok(updated)
            }
            CycleLockOutcome::NotActive(cycle) => Err(VslaError::InvalidTransition(format!(
                "cycle {} is {} and cannot be locked",
                cycle.id, cycle.status
            ))),
            CycleLockOutcome::Unreconciled(detail) => {
                Err(VslaError::FinancialIntegrityViolation(detail))
            }
        }
    }
}
