//! Repository port for the cycle accounting core.
//!
//! Services speak to storage only through [`LedgerRepository`]; the Postgres
//! adapter backs production and an in-memory adapter backs tests. Every
//! method takes an explicit tenant id: there is no ambient tenant context,
//! and pooled-fund math must never mix tenants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{ApprovalStatus, Cycle, Shareout, Transaction};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".into()),
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Outcome of the idempotent share-out insert: either this call created the
/// row, or a row for the (cycle, member) pair already existed and is returned
/// unchanged.
#[derive(Debug, Clone)]
pub enum ShareoutInsert {
    Created(Shareout),
    Existing(Shareout),
}

impl ShareoutInsert {
    pub fn record(&self) -> &Shareout {
        match self {
            ShareoutInsert::Created(s) | ShareoutInsert::Existing(s) => s,
        }
    }

    pub fn into_record(self) -> Shareout {
        match self {
            ShareoutInsert::Created(s) | ShareoutInsert::Existing(s) => s,
        }
    }
}

/// Outcome of an atomic approval decision. A decision only lands while the
/// transaction is still pending and its cycle still accepts contributions;
/// both checks happen under the same storage transaction as the write.
#[derive(Debug, Clone)]
pub enum DecideOutcome {
    Decided(Transaction),
    AlreadyDecided(Transaction),
    LedgerFrozen(Cycle),
}

/// Outcome of an atomic lock-for-shareout. The aggregate scan and the status
/// flip happen under an exclusive hold on the cycle row, so no approval can
/// commit between the recomputation and the freeze.
#[derive(Debug, Clone)]
pub enum CycleLockOutcome {
    Locked(Cycle),
    NotActive(Cycle),
    Unreconciled(String),
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    // Transactions
    async fn insert_transaction(&self, tx: &Transaction) -> RepositoryResult<Transaction>;
    async fn transaction_by_id(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<Transaction>;
    /// Approve or reject a pending transaction. The status write is
    /// conditional on the owning cycle still being active, atomically with
    /// the check; once a cycle is locked no decision can land.
    async fn decide_transaction(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        decision: ApprovalStatus,
    ) -> RepositoryResult<DecideOutcome>;
    /// All approved ledger rows of a cycle, ordered by created_at.
    async fn approved_for_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> RepositoryResult<Vec<Transaction>>;
    async fn approved_for_member(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
    ) -> RepositoryResult<Vec<Transaction>>;

    // Cycles
    async fn insert_cycle(&self, cycle: &Cycle) -> RepositoryResult<Cycle>;
    async fn cycle_by_id(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<Cycle>;
    async fn update_cycle(&self, cycle: &Cycle) -> RepositoryResult<Cycle>;
    /// Recompute the cycle's aggregates from its approved rows and freeze
    /// them onto the row with status `locked`, all in one storage
    /// transaction. In-flight decisions are drained first: they hold the
    /// cycle row shared, this takes it exclusively.
    async fn lock_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> RepositoryResult<CycleLockOutcome>;

    // Share-outs
    /// Insert-or-fetch-existing under the (cycle_id, member_id) unique
    /// constraint. This is the at-most-once guarantee for payouts.
    async fn insert_shareout(&self, shareout: &Shareout) -> RepositoryResult<ShareoutInsert>;
    async fn shareout_for_member(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
    ) -> RepositoryResult<Option<Shareout>>;
    async fn shareouts_for_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> RepositoryResult<Vec<Shareout>>;
}
