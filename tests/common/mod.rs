//! Shared harness: the full service stack over the in-memory repository.
#![allow(dead_code)] // each test binary uses a different slice of the harness

use bigdecimal::BigDecimal;
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use vsla_core::adapters::MemoryLedgerRepository;
use vsla_core::domain::{Cycle, Transaction, TransactionType};
use vsla_core::ports::LedgerRepository;
use vsla_core::services::{
    ContributionCalculator, CycleAggregator, CycleLifecycle, LedgerService, PerformanceService,
    ShareoutEngine,
};

pub struct Harness {
    pub repo: Arc<MemoryLedgerRepository>,
    pub tenant: Uuid,
    pub ledger: LedgerService,
    pub lifecycle: CycleLifecycle,
    pub engine: Arc<ShareoutEngine>,
    pub aggregator: CycleAggregator,
    pub calculator: ContributionCalculator,
    pub performance: PerformanceService,
}

impl Harness {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryLedgerRepository::new());
        let dyn_repo: Arc<dyn LedgerRepository> = repo.clone();
        Self {
            tenant: Uuid::new_v4(),
            ledger: LedgerService::new(dyn_repo.clone()),
            lifecycle: CycleLifecycle::new(dyn_repo.clone()),
            engine: Arc::new(ShareoutEngine::new(dyn_repo.clone())),
            aggregator: CycleAggregator::new(dyn_repo.clone()),
            calculator: ContributionCalculator::new(dyn_repo.clone()),
            performance: PerformanceService::new(dyn_repo),
            repo,
        }
    }

    pub async fn open_cycle(&self) -> Cycle {
        self.lifecycle
            .open_cycle(self.tenant, "test cycle".into(), Utc::now())
            .await
            .expect("open cycle")
    }

    /// Record and immediately approve a ledger entry.
    pub async fn approved(
        &self,
        cycle_id: Uuid,
        member_id: Uuid,
        transaction_type: TransactionType,
        amount: &str,
        shares: Option<i64>,
    ) -> Transaction {
        let tx = self
            .ledger
            .record_transaction(
                self.tenant,
                cycle_id,
                member_id,
                transaction_type,
                BigDecimal::from_str(amount).expect("amount literal"),
                shares,
            )
            .await
            .expect("record transaction");
        self.ledger
            .approve(self.tenant, tx.id)
            .await
            .expect("approve transaction")
    }
}

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).expect("decimal literal")
}
