//! Per-member contribution accounting within a cycle.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionType};
use crate::error::VslaResult;
use crate::ports::LedgerRepository;

/// Summary of one member's approved ledger activity in a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberContribution {
    pub member_id: Uuid,
    pub shares_owned: i64,
    pub share_amount: BigDecimal,
    pub welfare_contributed: BigDecimal,
    pub penalties_paid: BigDecimal,
    pub loans_taken: BigDecimal,
    pub loans_repaid: BigDecimal,
}

impl MemberContribution {
    pub fn empty(member_id: Uuid) -> Self {
        let zero = BigDecimal::from(0);
        Self {
            member_id,
            shares_owned: 0,
            share_amount: zero.clone(),
            welfare_contributed: zero.clone(),
            penalties_paid: zero.clone(),
            loans_taken: zero.clone(),
            loans_repaid: zero,
        }
    }

    /// Fold one approved ledger row into the summary.
    pub fn apply(&mut self, tx: &Transaction) {
        match tx.transaction_type {
            TransactionType::SharePurchase => {
                self.shares_owned += tx.share_count.unwrap_or(0);
                self.share_amount += &tx.amount;
            }
            TransactionType::WelfareContribution => self.welfare_contributed += &tx.amount,
            TransactionType::PenaltyFine => self.penalties_paid += &tx.amount,
            TransactionType::LoanIssuance => self.loans_taken += &tx.amount,
            TransactionType::LoanRepayment => self.loans_repaid += &tx.amount,
        }
    }

    pub fn from_transactions(member_id: Uuid, transactions: &[Transaction]) -> Self {
        let mut summary = Self::empty(member_id);
        for tx in transactions {
            summary.apply(tx);
        }
        summary
    }

    /// Unpaid borrowing, floored at zero. Repayments beyond the principal are
    /// the pool's interest income, never a credit to the member.
    pub fn outstanding_loan(&self) -> BigDecimal {
        let diff = &self.loans_taken - &self.loans_repaid;
        if diff > BigDecimal::from(0) {
            diff
        } else {
            BigDecimal::from(0)
        }
    }

    /// Interest this member paid into the pool: repayment beyond principal.
    pub fn interest_paid(&self) -> BigDecimal {
        let diff = &self.loans_repaid - &self.loans_taken;
        if diff > BigDecimal::from(0) {
            diff
        } else {
            BigDecimal::from(0)
        }
    }
}

/// Derives a single member's position in a cycle from the ledger.
pub struct ContributionCalculator {
    repo: Arc<dyn LedgerRepository>,
}

impl ContributionCalculator {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        Self { repo }
    }

    pub async fn compute_member_contribution(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
    ) -> VslaResult<MemberContribution> {
        let transactions = self
            .repo
            .approved_for_member(tenant_id, cycle_id, member_id)
            .await?;
        Ok(MemberContribution::from_transactions(
            member_id,
            &transactions,
        ))
    }
}
