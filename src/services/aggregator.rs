//! Cycle-wide aggregation over the transaction ledger.
//!
//! Totals are recomputed in full on every call rather than maintained
//! incrementally; cycles are aggregated a handful of times (previews, lock,
//! finalization audit), so the scan keeps correctness simple. After lock the
//! frozen cycle columns are authoritative and this recomputation serves as
//! the reconciliation tool.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Cycle, CycleStatus, Transaction};
use crate::error::VslaResult;
use crate::ports::LedgerRepository;
use crate::services::contribution::MemberContribution;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleTotals {
    pub shares_count: i64,
    pub shares_contributed: BigDecimal,
    pub welfare_contributed: BigDecimal,
    pub penalties_collected: BigDecimal,
    pub loan_interest_earned: BigDecimal,
    pub loans_issued: BigDecimal,
    pub loans_repaid: BigDecimal,
    pub available_for_shareout: BigDecimal,
}

impl CycleTotals {
    pub fn zero() -> Self {
        let zero = BigDecimal::from(0);
        Self {
            shares_count: 0,
            shares_contributed: zero.clone(),
            welfare_contributed: zero.clone(),
            penalties_collected: zero.clone(),
            loan_interest_earned: zero.clone(),
            loans_issued: zero.clone(),
            loans_repaid: zero.clone(),
            available_for_shareout: zero,
        }
    }

    /// Roll up per-member summaries. Interest earned and outstanding balances
    /// are folded per member first so one member's overpayment never masks
    /// another's arrears.
    pub fn from_contributions(contributions: &[MemberContribution]) -> Self {
        let mut totals = Self::zero();
        for c in contributions {
            totals.shares_count += c.shares_owned;
            totals.shares_contributed += &c.share_amount;
            totals.welfare_contributed += &c.welfare_contributed;
            totals.penalties_collected += &c.penalties_paid;
            totals.loans_issued += &c.loans_taken;
            totals.loans_repaid += &c.loans_repaid;
            totals.loan_interest_earned += c.interest_paid();
        }
        totals.available_for_shareout = &totals.shares_contributed
            + &totals.welfare_contributed
            + &totals.penalties_collected
            + &totals.loan_interest_earned;
        totals
    }

    /// The frozen totals stored on a locked cycle row.
    pub fn from_cycle(cycle: &Cycle) -> Self {
        Self {
            shares_count: cycle.total_shares_count,
            shares_contributed: cycle.total_shares_contributed.clone(),
            welfare_contributed: cycle.total_welfare_contributed.clone(),
            penalties_collected: cycle.total_penalties_collected.clone(),
            loan_interest_earned: cycle.total_loan_interest_earned.clone(),
            loans_issued: cycle.total_loans_issued.clone(),
            loans_repaid: cycle.total_loans_repaid.clone(),
            available_for_shareout: cycle.total_available_for_shareout.clone(),
        }
    }

    /// Write these totals onto the cycle row and mark it locked. From here on
    /// the ledger is immutable and the frozen columns are authoritative.
    pub fn freeze_onto(&self, cycle: &mut Cycle, end_date: DateTime<Utc>) {
        cycle.end_date = Some(end_date);
        cycle.status = CycleStatus::Locked;
        cycle.total_shares_count = self.shares_count;
        cycle.total_shares_contributed = self.shares_contributed.clone();
        cycle.total_welfare_contributed = self.welfare_contributed.clone();
        cycle.total_penalties_collected = self.penalties_collected.clone();
        cycle.total_loan_interest_earned = self.loan_interest_earned.clone();
        cycle.total_loans_issued = self.loans_issued.clone();
        cycle.total_loans_repaid = self.loans_repaid.clone();
        cycle.total_available_for_shareout = self.available_for_shareout.clone();
        cycle.updated_at = Utc::now();
    }

    /// Double-entry reconciliation: the distributable pool must equal the sum
    /// of its components.
    pub fn reconciles(&self) -> bool {
        self.available_for_shareout
            == &self.shares_contributed
                + &self.welfare_contributed
                + &self.penalties_collected
                + &self.loan_interest_earned
    }
}

/// Computes cycle-wide totals from approved ledger rows.
pub struct CycleAggregator {
    repo: Arc<dyn LedgerRepository>,
}

impl CycleAggregator {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        Self { repo }
    }

    /// Group a cycle's approved rows into per-member summaries, ordered by
    /// member id.
    pub async fn member_contributions(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> VslaResult<Vec<MemberContribution>> {
        let transactions = self.repo.approved_for_cycle(tenant_id, cycle_id).await?;
        Ok(group_by_member(&transactions))
    }

    pub async fn compute_cycle_totals(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> VslaResult<CycleTotals> {
        let contributions = self.member_contributions(tenant_id, cycle_id).await?;
        let totals = CycleTotals::from_contributions(&contributions);
        tracing::debug!(
            %cycle_id,
            members = contributions.len(),
            available = %totals.available_for_shareout,
            "recomputed cycle totals"
        );
        Ok(totals)
    }
}

pub fn group_by_member(transactions: &[Transaction]) -> Vec<MemberContribution> {
    let mut by_member: BTreeMap<Uuid, MemberContribution> = BTreeMap::new();
    for tx in transactions {
        by_member
            .entry(tx.member_id)
            .or_insert_with(|| MemberContribution::empty(tx.member_id))
            .apply(tx);
    }
    by_member.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApprovalStatus, TransactionType};

    fn approved(member_id: Uuid, tt: TransactionType, amount: i64, shares: Option<i64>) -> Transaction {
        let mut tx = Transaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            member_id,
            tt,
            BigDecimal::from(amount),
            shares,
        );
        tx.status = ApprovalStatus::Approved;
        tx
    }

    #[test]
    fn totals_reconcile_by_construction() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let txs = vec![
            approved(a, TransactionType::SharePurchase, 1000, Some(100)),
            approved(b, TransactionType::SharePurchase, 9000, Some(900)),
            approved(a, TransactionType::WelfareContribution, 200, None),
            approved(b, TransactionType::PenaltyFine, 50, None),
            approved(b, TransactionType::LoanIssuance, 1000, None),
            approved(b, TransactionType::LoanRepayment, 1500, None),
        ];

        let totals = CycleTotals::from_contributions(&group_by_member(&txs));
        assert_eq!(totals.shares_count, 1000);
        assert_eq!(totals.shares_contributed, BigDecimal::from(10000));
        assert_eq!(totals.loan_interest_earned, BigDecimal::from(500));
        assert_eq!(totals.available_for_shareout, BigDecimal::from(10750));
        assert!(totals.reconciles());
    }

    #[test]
    fn interest_is_folded_per_member() {
        // A overpays by 100, B still owes 500: pool interest is 100, not
        // netted against B's arrears.
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let txs = vec![
            approved(a, TransactionType::LoanIssuance, 1000, None),
            approved(a, TransactionType::LoanRepayment, 1100, None),
            approved(b, TransactionType::LoanIssuance, 500, None),
        ];

        let totals = CycleTotals::from_contributions(&group_by_member(&txs));
        assert_eq!(totals.loan_interest_earned, BigDecimal::from(100));
        assert_eq!(totals.loans_issued, BigDecimal::from(1500));
        assert_eq!(totals.loans_repaid, BigDecimal::from(1100));
    }

    #[test]
    fn empty_cycle_has_zero_totals() {
        let totals = CycleTotals::from_contributions(&[]);
        assert_eq!(totals, CycleTotals::zero());
        assert!(totals.reconciles());
    }
}
