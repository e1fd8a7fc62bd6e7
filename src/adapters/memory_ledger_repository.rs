//! In-memory implementation of the ledger repository.
//!
//! Backs the test suites and mirrors the storage-level guarantees of the
//! Postgres adapter: tenant-scoped queries and the (cycle_id, member_id)
//! uniqueness for share-out rows, enforced under a single mutex so
//! concurrent finalizations observe the same at-most-once behavior.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{ApprovalStatus, Cycle, CycleStatus, Shareout, Transaction};
use crate::ports::{
    CycleLockOutcome, DecideOutcome, LedgerRepository, RepositoryError, RepositoryResult,
    ShareoutInsert,
};
use crate::services::aggregator::{group_by_member, CycleTotals};

#[derive(Default)]
struct Store {
    transactions: Vec<Transaction>,
    cycles: Vec<Cycle>,
    shareouts: Vec<Shareout>,
}

#[derive(Default)]
pub struct MemoryLedgerRepository {
    store: Mutex<Store>,
}

impl MemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerRepository for MemoryLedgerRepository {
    async fn insert_transaction(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut store = self.store.lock().expect("ledger store poisoned");
        store.transactions.push(tx.clone());
        Ok(tx.clone())
    }

    async fn transaction_by_id(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<Transaction> {
        let store = self.store.lock().expect("ledger store poisoned");
        store
            .transactions
            .iter()
            .find(|t| t.tenant_id == tenant_id && t.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))
    }

    // The single mutex makes the pending and cycle-active checks atomic with
    // the status write, matching the Postgres adapter's transaction.
    async fn decide_transaction(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        decision: ApprovalStatus,
    ) -> RepositoryResult<DecideOutcome> {
        let mut store = self.store.lock().expect("ledger store poisoned");
        let pos = store
            .transactions
            .iter()
            .position(|t| t.tenant_id == tenant_id && t.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))?;
        if store.transactions[pos].status != ApprovalStatus::Pending {
            return Ok(DecideOutcome::AlreadyDecided(store.transactions[pos].clone()));
        }

        let cycle_id = store.transactions[pos].cycle_id;
        let cycle = store
            .cycles
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.id == cycle_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("cycle {cycle_id}")))?;
        if cycle.status != CycleStatus::Active {
            return Ok(DecideOutcome::LedgerFrozen(cycle));
        }

        let tx = &mut store.transactions[pos];
        tx.status = decision;
        tx.updated_at = Utc::now();
        Ok(DecideOutcome::Decided(tx.clone()))
    }

    async fn approved_for_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> RepositoryResult<Vec<Transaction>> {
        let store = self.store.lock().expect("ledger store poisoned");
        Ok(store
            .transactions
            .iter()
            .filter(|t| {
                t.tenant_id == tenant_id
                    && t.cycle_id == cycle_id
                    && t.status == ApprovalStatus::Approved
            })
            .cloned()
            .collect())
    }

    async fn approved_for_member(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
    ) -> RepositoryResult<Vec<Transaction>> {
        let store = self.store.lock().expect("ledger store poisoned");
        Ok(store
            .transactions
            .iter()
            .filter(|t| {
                t.tenant_id == tenant_id
                    && t.cycle_id == cycle_id
                    && t.member_id == member_id
                    && t.status == ApprovalStatus::Approved
            })
            .cloned()
            .collect())
    }

    async fn insert_cycle(&self, cycle: &Cycle) -> RepositoryResult<Cycle> {
        let mut store = self.store.lock().expect("ledger store poisoned");
        store.cycles.push(cycle.clone());
        Ok(cycle.clone())
    }

    async fn cycle_by_id(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<Cycle> {
        let store = self.store.lock().expect("ledger store poisoned");
        store
            .cycles
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("cycle {id}")))
    }

    async fn update_cycle(&self, cycle: &Cycle) -> RepositoryResult<Cycle> {
        let mut store = self.store.lock().expect("ledger store poisoned");
        let slot = store
            .cycles
            .iter_mut()
            .find(|c| c.tenant_id == cycle.tenant_id && c.id == cycle.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("cycle {}", cycle.id)))?;
        *slot = cycle.clone();
        Ok(cycle.clone())
    }

    async fn lock_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> RepositoryResult<CycleLockOutcome> {
        let mut store = self.store.lock().expect("ledger store poisoned");
        let approved: Vec<Transaction> = store
            .transactions
            .iter()
            .filter(|t| {
                t.tenant_id == tenant_id
                    && t.cycle_id == cycle_id
                    && t.status == ApprovalStatus::Approved
            })
            .cloned()
            .collect();

        let cycle = store
            .cycles
            .iter_mut()
            .find(|c| c.tenant_id == tenant_id && c.id == cycle_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("cycle {cycle_id}")))?;
        if cycle.status != CycleStatus::Active {
            return Ok(CycleLockOutcome::NotActive(cycle.clone()));
        }

        let totals = CycleTotals::from_contributions(&group_by_member(&approved));
        if !totals.reconciles() {
            return Ok(CycleLockOutcome::Unreconciled(format!(
                "cycle {cycle_id} totals do not reconcile at lock"
            )));
        }

        totals.freeze_onto(cycle, end_date);
        Ok(CycleLockOutcome::Locked(cycle.clone()))
    }

    async fn insert_shareout(&self, shareout: &Shareout) -> RepositoryResult<ShareoutInsert> {
        let mut store = self.store.lock().expect("ledger store poisoned");
        if let Some(existing) = store
            .shareouts
            .iter()
            .find(|s| s.cycle_id == shareout.cycle_id && s.member_id == shareout.member_id)
        {
            return Ok(ShareoutInsert::Existing(existing.clone()));
        }
        store.shareouts.push(shareout.clone());
        Ok(ShareoutInsert::Created(shareout.clone()))
    }

    async fn shareout_for_member(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
    ) -> RepositoryResult<Option<Shareout>> {
        let store = self.store.lock().expect("ledger store poisoned");
        Ok(store
            .shareouts
            .iter()
            .find(|s| {
                s.tenant_id == tenant_id && s.cycle_id == cycle_id && s.member_id == member_id
            })
            .cloned())
    }

    async fn shareouts_for_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> RepositoryResult<Vec<Shareout>> {
        let store = self.store.lock().expect("ledger store poisoned");
        Ok(store
            .shareouts
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.cycle_id == cycle_id)
            .cloned()
            .collect())
    }
}
