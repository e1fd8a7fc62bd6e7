//! Ledger primitives: recording and approving member transactions.
//!
//! Every entry starts `pending`; approval is the human-in-the-loop control
//! over the shared fund, and only approved rows ever feed an aggregate.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ApprovalStatus, Transaction, TransactionType};
use crate::error::{VslaError, VslaResult};
use crate::ports::{DecideOutcome, LedgerRepository};
use crate::validation::{validate_amount, validate_share_count};

pub struct LedgerService {
    repo: Arc<dyn LedgerRepository>,
}

impl LedgerService {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        Self { repo }
    }

    /// Record a pending ledger entry against an active cycle.
    pub async fn record_transaction(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
        transaction_type: TransactionType,
        amount: BigDecimal,
        share_count: Option<i64>,
    ) -> VslaResult<Transaction> {
        validate_amount(&amount)?;
        validate_share_count(transaction_type, share_count)?;

        let cycle = self.repo.cycle_by_id(tenant_id, cycle_id).await?;
        if !cycle.accepts_contributions() {
            return Err(VslaError::CycleNotEligible(format!(
                "cycle {} is {} and no longer accepts contributions",
                cycle.id, cycle.status
            )));
        }

        let tx = Transaction::new(
            tenant_id,
            cycle_id,
            member_id,
            transaction_type,
            amount,
            share_count,
        );
        let inserted = self.repo.insert_transaction(&tx).await?;
        tracing::info!(
            transaction_id = %inserted.id,
            %cycle_id,
            %member_id,
            transaction_type = %transaction_type,
            amount = %inserted.amount,
            "recorded pending transaction"
        );
        Ok(inserted)
    }

    pub async fn approve(&self, tenant_id: Uuid, transaction_id: Uuid) -> VslaResult<Transaction> {
        self.decide(tenant_id, transaction_id, ApprovalStatus::Approved)
            .await
    }

    pub async fn reject(&self, tenant_id: Uuid, transaction_id: Uuid) -> VslaResult<Transaction> {
        self.decide(tenant_id, transaction_id, ApprovalStatus::Rejected)
            .await
    }

    // The pending and cycle-active checks live inside the repository's
    // decide operation, atomically with the status write; an approval racing
    // a lock-for-shareout can never land after the totals are frozen.
    async fn decide(
        &self,
        tenant_id: Uuid,
        transaction_id: Uuid,
        decision: ApprovalStatus,
    ) -> VslaResult<Transaction> {
        match self
            .repo
            .decide_transaction(tenant_id, transaction_id, decision)
            .await?
        {
            DecideOutcome::Decided(updated) => {
                tracing::info!(
                    transaction_id = %updated.id,
                    status = ?updated.status,
                    "transaction decided"
                );
                Ok(updated)
            }
            DecideOutcome::AlreadyDecided(tx) => Err(VslaError::InvalidTransition(format!(
                "transaction {} has already been decided",
                tx.id
            ))),
            DecideOutcome::LedgerFrozen(cycle) => Err(VslaError::CycleNotEligible(format!(
                "cycle {} is {}; its ledger is frozen",
                cycle.id, cycle.status
            ))),
        }
    }
}
