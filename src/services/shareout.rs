//! Share-out engine: end-of-cycle distribution of the pooled fund.
//!
//! Each entitlement pool (share value, loan interest, welfare) is split
//! across members with the largest-remainder allocation from
//! [`crate::services::allocation`], so distributed amounts sum exactly to the
//! pool. Finalization persists one immutable row per (cycle, member) under a
//! storage-level unique constraint; a repeat call returns the existing row.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Cycle, CycleStatus, ExpectedShareout, Shareout};
use crate::error::{VslaError, VslaResult};
use crate::ports::{LedgerRepository, ShareoutInsert};
use crate::services::aggregator::{CycleAggregator, CycleTotals};
use crate::services::allocation::{allocate_proportional, percentage_sum, Stake};
use crate::services::contribution::MemberContribution;

/// Tolerance for the percentage reconciliation check.
const PERCENTAGE_EPSILON: &str = "0.000001";

pub struct ShareoutEngine {
    repo: Arc<dyn LedgerRepository>,
    aggregator: CycleAggregator,
}

impl ShareoutEngine {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        let aggregator = CycleAggregator::new(repo.clone());
        Self { repo, aggregator }
    }

    /// Non-persisting preview of a member's share-out. Works on active cycles
    /// too, using freshly recomputed totals; locked cycles use the frozen
    /// totals so previews and finalization agree to the cent.
    pub async fn expected_shareout(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
    ) -> VslaResult<ExpectedShareout> {
        let cycle = self.repo.cycle_by_id(tenant_id, cycle_id).await?;
        let totals = self.totals_for(tenant_id, &cycle).await?;
        let contributions = self
            .aggregator
            .member_contributions(tenant_id, cycle_id)
            .await?;

        let table = build_allocation_table(cycle_id, &totals, &contributions)?;
        Ok(table
            .into_iter()
            .find(|row| row.member_id == member_id)
            .unwrap_or_else(|| zero_shareout(cycle_id, member_id)))
    }

    /// Persist a member's share-out exactly once. Idempotent: a second call
    /// for the same (cycle, member) returns the already-persisted row.
    pub async fn finalize_shareout(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
    ) -> VslaResult<ShareoutInsert> {
        let cycle = self.repo.cycle_by_id(tenant_id, cycle_id).await?;

        if let Some(existing) = self
            .repo
            .shareout_for_member(tenant_id, cycle_id, member_id)
            .await?
        {
            return Ok(ShareoutInsert::Existing(existing));
        }

        match cycle.status {
            CycleStatus::Active => {
                return Err(VslaError::CycleNotEligible(format!(
                    "cycle {} is still active; lock it before share-out",
                    cycle.id
                )))
            }
            CycleStatus::Completed => {
                return Err(VslaError::CycleNotEligible(format!(
                    "cycle {} is completed and member {} has no share-out",
                    cycle.id, member_id
                )))
            }
            CycleStatus::Locked => {}
        }

        let contributions = self
            .aggregator
            .member_contributions(tenant_id, cycle_id)
            .await?;
        let totals = self.verify_cycle_integrity(&cycle, &contributions)?;

        if !contributions.iter().any(|c| c.member_id == member_id) {
            return Err(VslaError::CycleNotEligible(format!(
                "member {} has no approved activity in cycle {}",
                member_id, cycle.id
            )));
        }

        let table = build_allocation_table(cycle_id, &totals, &contributions)?;
        let expected = table
            .into_iter()
            .find(|row| row.member_id == member_id)
            .unwrap_or_else(|| zero_shareout(cycle_id, member_id));

        let outcome = self
            .repo
            .insert_shareout(&expected.into_shareout(tenant_id))
            .await?;

        if let ShareoutInsert::Created(record) = &outcome {
            tracing::info!(
                %cycle_id,
                %member_id,
                net_payout = %record.net_payout,
                "finalized member share-out"
            );
            self.complete_if_done(tenant_id, &cycle, &contributions)
                .await?;
        }

        Ok(outcome)
    }

    /// Finalize every eligible member of a locked cycle. Drives the cycle to
    /// `completed` once the last member lands; safe to re-run.
    pub async fn finalize_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> VslaResult<Vec<Shareout>> {
        let cycle = self.repo.cycle_by_id(tenant_id, cycle_id).await?;
        if cycle.status == CycleStatus::Active {
            return Err(VslaError::CycleNotEligible(format!(
                "cycle {} is still active; lock it before share-out",
                cycle.id
            )));
        }
        if cycle.status == CycleStatus::Completed {
            return Ok(self.repo.shareouts_for_cycle(tenant_id, cycle_id).await?);
        }

        let contributions = self
            .aggregator
            .member_contributions(tenant_id, cycle_id)
            .await?;

        // No approved activity means nothing to distribute; vacuously every
        // member is paid, so the cycle completes immediately.
        if contributions.is_empty() {
            self.complete_if_done(tenant_id, &cycle, &contributions)
                .await?;
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(contributions.len());
        for contribution in &contributions {
            let outcome = self
                .finalize_shareout(tenant_id, cycle_id, contribution.member_id)
                .await?;
            records.push(outcome.into_record());
        }
        Ok(records)
    }

    async fn totals_for(&self, tenant_id: Uuid, cycle: &Cycle) -> VslaResult<CycleTotals> {
        match cycle.status {
            CycleStatus::Active => {
                self.aggregator
                    .compute_cycle_totals(tenant_id, cycle.id)
                    .await
            }
            CycleStatus::Locked | CycleStatus::Completed => Ok(CycleTotals::from_cycle(cycle)),
        }
    }

    /// The frozen totals must reconcile internally and match a fresh
    /// recomputation from the ledger. Any mismatch means the books are
    /// inconsistent and this cycle's finalization halts.
    fn verify_cycle_integrity(
        &self,
        cycle: &Cycle,
        contributions: &[MemberContribution],
    ) -> VslaResult<CycleTotals> {
        let frozen = CycleTotals::from_cycle(cycle);
        if !frozen.reconciles() {
            return Err(VslaError::FinancialIntegrityViolation(format!(
                "cycle {}: available pool {} does not equal the sum of its components",
                cycle.id, frozen.available_for_shareout
            )));
        }

        let recomputed = CycleTotals::from_contributions(contributions);
        if frozen != recomputed {
            return Err(VslaError::FinancialIntegrityViolation(format!(
                "cycle {}: frozen totals diverge from the ledger (frozen pool {}, ledger pool {})",
                cycle.id, frozen.available_for_shareout, recomputed.available_for_shareout
            )));
        }

        Ok(frozen)
    }

    async fn complete_if_done(
        &self,
        tenant_id: Uuid,
        cycle: &Cycle,
        contributions: &[MemberContribution],
    ) -> VslaResult<()> {
        let persisted = self
            .repo
            .shareouts_for_cycle(tenant_id, cycle.id)
            .await?
            .len();
        if persisted < contributions.len() {
            return Ok(());
        }

        if cycle.status.can_transition_to(CycleStatus::Completed) {
            let mut completed = cycle.clone();
            completed.status = CycleStatus::Completed;
            completed.updated_at = chrono::Utc::now();
            self.repo.update_cycle(&completed).await?;
            tracing::info!(cycle_id = %cycle.id, members = persisted, "cycle completed");
        }
        Ok(())
    }
}

/// Compute every eligible member's entitlement for the cycle in one pass.
/// The three pools are allocated independently over the same stakes, so the
/// per-pool remainder policy applies to each.
pub fn build_allocation_table(
    cycle_id: Uuid,
    totals: &CycleTotals,
    contributions: &[MemberContribution],
) -> VslaResult<Vec<ExpectedShareout>> {
    let zero = BigDecimal::from(0);

    let mut ordered: Vec<&MemberContribution> = contributions.iter().collect();
    ordered.sort_by_key(|c| c.member_id);

    let stakes: Vec<Stake> = ordered
        .iter()
        .map(|c| Stake {
            member_id: c.member_id,
            shares: c.shares_owned,
        })
        .collect();

    let share_slices = allocate_proportional(&totals.shares_contributed, &stakes);
    let interest_slices = allocate_proportional(&totals.loan_interest_earned, &stakes);
    let welfare_slices = allocate_proportional(&totals.welfare_contributed, &stakes);

    if totals.shares_count > 0 {
        let epsilon: BigDecimal = PERCENTAGE_EPSILON.parse().expect("literal epsilon");
        let drift = (percentage_sum(&share_slices) - BigDecimal::from(1)).abs();
        if drift > epsilon {
            return Err(VslaError::FinancialIntegrityViolation(format!(
                "cycle {cycle_id}: share percentages drift from 1.0 by {drift}"
            )));
        }
    }

    let mut table = Vec::with_capacity(ordered.len());
    for (idx, contribution) in ordered.iter().enumerate() {
        let share_value = share_slices[idx].amount.clone();
        let interest_earnings = interest_slices[idx].amount.clone();
        let welfare_return = welfare_slices[idx].amount.clone();
        let gross_entitlement = &share_value + &interest_earnings + &welfare_return;

        let outstanding_loan = contribution.outstanding_loan();
        let net_payout = if gross_entitlement > outstanding_loan {
            &gross_entitlement - &outstanding_loan
        } else {
            zero.clone()
        };

        table.push(ExpectedShareout {
            cycle_id,
            member_id: contribution.member_id,
            shares_owned: contribution.shares_owned,
            share_percentage: share_slices[idx].percentage.clone(),
            share_value,
            interest_earnings,
            welfare_return,
            gross_entitlement,
            outstanding_loan,
            net_payout,
        });
    }

    Ok(table)
}

fn zero_shareout(cycle_id: Uuid, member_id: Uuid) -> ExpectedShareout {
    let zero = BigDecimal::from(0);
    ExpectedShareout {
        cycle_id,
        member_id,
        shares_owned: 0,
        share_percentage: zero.clone(),
        share_value: zero.clone(),
        interest_earnings: zero.clone(),
        welfare_return: zero.clone(),
        gross_entitlement: zero.clone(),
        outstanding_loan: zero.clone(),
        net_payout: zero,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregator::group_by_member;
    use crate::domain::{ApprovalStatus, Transaction, TransactionType};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn approved(member: Uuid, tt: TransactionType, amount: i64, shares: Option<i64>) -> Transaction {
        let mut tx = Transaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            member,
            tt,
            BigDecimal::from(amount),
            shares,
        );
        tx.status = ApprovalStatus::Approved;
        tx
    }

    #[test]
    fn member_with_ten_percent_and_outstanding_loan() {
        // Shares pool 10000 (A holds 1000 of 10000 share units), welfare
        // 2000, interest 500 from B's repayment; A owes 300.
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let txs = vec![
            approved(a, TransactionType::SharePurchase, 1000, Some(1000)),
            approved(b, TransactionType::SharePurchase, 9000, Some(9000)),
            approved(a, TransactionType::WelfareContribution, 500, None),
            approved(b, TransactionType::WelfareContribution, 1500, None),
            approved(a, TransactionType::LoanIssuance, 300, None),
            approved(b, TransactionType::LoanIssuance, 1000, None),
            approved(b, TransactionType::LoanRepayment, 1500, None),
        ];

        let contributions = group_by_member(&txs);
        let totals = CycleTotals::from_contributions(&contributions);
        let table = build_allocation_table(Uuid::new_v4(), &totals, &contributions).unwrap();

        let row_a = table.iter().find(|r| r.member_id == a).unwrap();
        assert_eq!(row_a.share_value, dec("1000.00"));
        assert_eq!(row_a.welfare_return, dec("200.00"));
        assert_eq!(row_a.interest_earnings, dec("50.00"));
        assert_eq!(row_a.gross_entitlement, dec("1250.00"));
        assert_eq!(row_a.outstanding_loan, dec("300"));
        assert_eq!(row_a.net_payout, dec("950.00"));
    }

    #[test]
    fn loan_exceeding_entitlement_floors_payout_at_zero() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let txs = vec![
            approved(a, TransactionType::SharePurchase, 1000, Some(10)),
            approved(b, TransactionType::SharePurchase, 1000, Some(10)),
            approved(a, TransactionType::LoanIssuance, 1200, None),
        ];

        let contributions = group_by_member(&txs);
        let totals = CycleTotals::from_contributions(&contributions);
        let table = build_allocation_table(Uuid::new_v4(), &totals, &contributions).unwrap();

        let row_a = table.iter().find(|r| r.member_id == a).unwrap();
        assert_eq!(row_a.gross_entitlement, dec("1000.00"));
        assert_eq!(row_a.net_payout, BigDecimal::from(0));
    }

    #[test]
    fn zero_share_member_gets_zero_entitlement_without_error() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let txs = vec![
            approved(a, TransactionType::SharePurchase, 1000, Some(10)),
            approved(b, TransactionType::WelfareContribution, 50, None),
        ];

        let contributions = group_by_member(&txs);
        let totals = CycleTotals::from_contributions(&contributions);
        let table = build_allocation_table(Uuid::new_v4(), &totals, &contributions).unwrap();

        let row_b = table.iter().find(|r| r.member_id == b).unwrap();
        assert_eq!(row_b.net_payout, BigDecimal::from(0));
        assert_eq!(row_b.share_percentage, BigDecimal::from(0));
    }

    #[test]
    fn empty_cycle_produces_empty_table() {
        let totals = CycleTotals::zero();
        let table = build_allocation_table(Uuid::new_v4(), &totals, &[]).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn payouts_never_exceed_the_pool() {
        let members: Vec<Uuid> = (1..=5).map(Uuid::from_u128).collect();
        let mut txs = Vec::new();
        for (i, m) in members.iter().enumerate() {
            txs.push(approved(*m, TransactionType::SharePurchase, 100 * (i as i64 + 1), Some(i as i64 + 1)));
            txs.push(approved(*m, TransactionType::WelfareContribution, 25, None));
        }
        txs.push(approved(members[0], TransactionType::LoanIssuance, 400, None));

        let contributions = group_by_member(&txs);
        let totals = CycleTotals::from_contributions(&contributions);
        let table = build_allocation_table(Uuid::new_v4(), &totals, &contributions).unwrap();

        let distributed: BigDecimal = table
            .iter()
            .fold(BigDecimal::from(0), |acc, r| acc + &r.net_payout);
        assert!(distributed <= totals.available_for_shareout);
    }
}
