//! Derived cycle performance ratios for the reporting layer.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::CycleStatus;
use crate::error::VslaResult;
use crate::ports::LedgerRepository;
use crate::services::aggregator::{CycleAggregator, CycleTotals};

const RATIO_SCALE: i64 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CyclePerformance {
    pub cycle_id: Uuid,
    pub status: CycleStatus,
    pub total_contributed: BigDecimal,
    pub total_distributed: BigDecimal,
    /// distributed / contributed, 0 when nothing was contributed.
    pub efficiency: BigDecimal,
    /// interest earned / loans issued, 0 when no loans were issued.
    pub average_interest_rate: BigDecimal,
    pub members_paid: usize,
}

pub struct PerformanceService {
    repo: Arc<dyn LedgerRepository>,
    aggregator: CycleAggregator,
}

impl PerformanceService {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        let aggregator = CycleAggregator::new(repo.clone());
        Self { repo, aggregator }
    }

    pub async fn cycle_performance(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> VslaResult<CyclePerformance> {
        let cycle = self.repo.cycle_by_id(tenant_id, cycle_id).await?;
        let totals = match cycle.status {
            CycleStatus::Active => {
                self.aggregator
                    .compute_cycle_totals(tenant_id, cycle_id)
                    .await?
            }
            _ => CycleTotals::from_cycle(&cycle),
        };

        let shareouts = self.repo.shareouts_for_cycle(tenant_id, cycle_id).await?;
        let distributed = shareouts
            .iter()
            .fold(BigDecimal::from(0), |acc, s| acc + &s.net_payout);

        Ok(CyclePerformance {
            cycle_id,
            status: cycle.status,
            efficiency: ratio(&distributed, &totals.available_for_shareout),
            average_interest_rate: ratio(&totals.loan_interest_earned, &totals.loans_issued),
            total_contributed: totals.available_for_shareout,
            total_distributed: distributed,
            members_paid: shareouts.len(),
        })
    }
}

fn ratio(numerator: &BigDecimal, denominator: &BigDecimal) -> BigDecimal {
    if denominator <= &BigDecimal::from(0) {
        return BigDecimal::from(0);
    }
    (numerator / denominator).with_scale(RATIO_SCALE)
}
