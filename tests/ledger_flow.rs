//! Ledger recording, approval flow, and lifecycle guards.

mod common;

use bigdecimal::BigDecimal;
use uuid::Uuid;

use common::{dec, Harness};
use vsla_core::domain::{ApprovalStatus, TransactionType};
use vsla_core::error::VslaError;
use vsla_core::ports::{DecideOutcome, LedgerRepository, ShareoutInsert};

#[tokio::test]
async fn rejects_malformed_entries_before_persistence() {
    let h = Harness::new();
    let cycle = h.open_cycle().await;
    let member = Uuid::from_u128(1);

    let negative = h
        .ledger
        .record_transaction(
            h.tenant,
            cycle.id,
            member,
            TransactionType::WelfareContribution,
            BigDecimal::from(-5),
            None,
        )
        .await;
    assert!(matches!(negative, Err(VslaError::InvalidAmount(_))));

    let sub_cent = h
        .ledger
        .record_transaction(
            h.tenant,
            cycle.id,
            member,
            TransactionType::WelfareContribution,
            dec("1.999"),
            None,
        )
        .await;
    assert!(matches!(sub_cent, Err(VslaError::InvalidAmount(_))));

    let missing_count = h
        .ledger
        .record_transaction(
            h.tenant,
            cycle.id,
            member,
            TransactionType::SharePurchase,
            BigDecimal::from(100),
            None,
        )
        .await;
    assert!(matches!(missing_count, Err(VslaError::InvalidShareCount(_))));

    let stray_count = h
        .ledger
        .record_transaction(
            h.tenant,
            cycle.id,
            member,
            TransactionType::LoanRepayment,
            BigDecimal::from(100),
            Some(3),
        )
        .await;
    assert!(matches!(stray_count, Err(VslaError::InvalidShareCount(_))));
}

#[tokio::test]
async fn pending_transactions_do_not_count_toward_aggregates() {
    let h = Harness::new();
    let cycle = h.open_cycle().await;
    let member = Uuid::from_u128(1);

    // Recorded but never approved.
    h.ledger
        .record_transaction(
            h.tenant,
            cycle.id,
            member,
            TransactionType::SharePurchase,
            BigDecimal::from(500),
            Some(50),
        )
        .await
        .unwrap();
    h.approved(cycle.id, member, TransactionType::SharePurchase, "100", Some(10)).await;

    let totals = h.aggregator.compute_cycle_totals(h.tenant, cycle.id).await.unwrap();
    assert_eq!(totals.shares_count, 10);
    assert_eq!(totals.shares_contributed, BigDecimal::from(100));
}

#[tokio::test]
async fn rejected_transactions_are_excluded_and_cannot_be_redecided() {
    let h = Harness::new();
    let cycle = h.open_cycle().await;
    let member = Uuid::from_u128(1);

    let tx = h
        .ledger
        .record_transaction(
            h.tenant,
            cycle.id,
            member,
            TransactionType::PenaltyFine,
            BigDecimal::from(25),
            None,
        )
        .await
        .unwrap();

    let rejected = h.ledger.reject(h.tenant, tx.id).await.unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);

    let again = h.ledger.approve(h.tenant, tx.id).await;
    assert!(matches!(again, Err(VslaError::InvalidTransition(_))));

    let totals = h.aggregator.compute_cycle_totals(h.tenant, cycle.id).await.unwrap();
    assert_eq!(totals.penalties_collected, BigDecimal::from(0));
}

#[tokio::test]
async fn locked_cycle_accepts_no_new_activity() {
    let h = Harness::new();
    let cycle = h.open_cycle().await;
    let member = Uuid::from_u128(1);

    h.approved(cycle.id, member, TransactionType::SharePurchase, "100", Some(10)).await;
    let pending = h
        .ledger
        .record_transaction(
            h.tenant,
            cycle.id,
            member,
            TransactionType::WelfareContribution,
            BigDecimal::from(10),
            None,
        )
        .await
        .unwrap();

    h.lifecycle.lock_cycle(h.tenant, cycle.id, None).await.unwrap();

    let record = h
        .ledger
        .record_transaction(
            h.tenant,
            cycle.id,
            member,
            TransactionType::WelfareContribution,
            BigDecimal::from(10),
            None,
        )
        .await;
    assert!(matches!(record, Err(VslaError::CycleNotEligible(_))));

    // A late approval would desynchronize the frozen totals.
    let approve = h.ledger.approve(h.tenant, pending.id).await;
    assert!(matches!(approve, Err(VslaError::CycleNotEligible(_))));
}

#[tokio::test]
async fn lock_is_one_way_and_end_date_is_validated() {
    let h = Harness::new();
    let cycle = h.open_cycle().await;
    let member = Uuid::from_u128(1);
    h.approved(cycle.id, member, TransactionType::SharePurchase, "100", Some(10)).await;

    let before_start = cycle.start_date - chrono::Duration::days(1);
    let bad = h
        .lifecycle
        .lock_cycle(h.tenant, cycle.id, Some(before_start))
        .await;
    assert!(matches!(bad, Err(VslaError::InvalidTransition(_))));

    h.lifecycle.lock_cycle(h.tenant, cycle.id, None).await.unwrap();
    let relock = h.lifecycle.lock_cycle(h.tenant, cycle.id, None).await;
    assert!(matches!(relock, Err(VslaError::InvalidTransition(_))));
}

#[tokio::test]
async fn completed_cycle_cannot_be_reopened_or_relocked() {
    let h = Harness::new();
    let cycle = h.open_cycle().await;
    let member = Uuid::from_u128(1);
    h.approved(cycle.id, member, TransactionType::SharePurchase, "100", Some(10)).await;

    h.lifecycle.lock_cycle(h.tenant, cycle.id, None).await.unwrap();
    h.engine.finalize_cycle(h.tenant, cycle.id).await.unwrap();

    let relock = h.lifecycle.lock_cycle(h.tenant, cycle.id, None).await;
    assert!(matches!(relock, Err(VslaError::InvalidTransition(_))));
}

#[tokio::test]
async fn member_contribution_summary_reflects_the_ledger() {
    let h = Harness::new();
    let cycle = h.open_cycle().await;
    let member = Uuid::from_u128(1);

    h.approved(cycle.id, member, TransactionType::SharePurchase, "150.50", Some(15)).await;
    h.approved(cycle.id, member, TransactionType::WelfareContribution, "20", None).await;
    h.approved(cycle.id, member, TransactionType::LoanIssuance, "200", None).await;
    h.approved(cycle.id, member, TransactionType::LoanRepayment, "80", None).await;

    let summary = h
        .calculator
        .compute_member_contribution(h.tenant, cycle.id, member)
        .await
        .unwrap();
    assert_eq!(summary.shares_owned, 15);
    assert_eq!(summary.share_amount, dec("150.50"));
    assert_eq!(summary.welfare_contributed, BigDecimal::from(20));
    assert_eq!(summary.outstanding_loan(), BigDecimal::from(120));
}

#[tokio::test]
async fn performance_metrics_for_a_completed_cycle() {
    let h = Harness::new();
    let cycle = h.open_cycle().await;
    let a = Uuid::from_u128(1);
    let b = Uuid::from_u128(2);

    h.approved(cycle.id, a, TransactionType::SharePurchase, "600", Some(60)).await;
    h.approved(cycle.id, b, TransactionType::SharePurchase, "400", Some(40)).await;
    h.approved(cycle.id, a, TransactionType::LoanIssuance, "500", None).await;
    h.approved(cycle.id, a, TransactionType::LoanRepayment, "550", None).await;

    h.lifecycle.lock_cycle(h.tenant, cycle.id, None).await.unwrap();
    h.engine.finalize_cycle(h.tenant, cycle.id).await.unwrap();

    let perf = h.performance.cycle_performance(h.tenant, cycle.id).await.unwrap();
    assert_eq!(perf.members_paid, 2);
    // Interest 50 on 500 issued.
    assert_eq!(perf.average_interest_rate, dec("0.1000"));
    // Pool 1050 fully distributed: no outstanding loans remain.
    assert_eq!(perf.total_contributed, dec("1050.00"));
    assert_eq!(perf.total_distributed, dec("1050.00"));
    assert_eq!(perf.efficiency, dec("1.0000"));
}

#[tokio::test]
async fn storage_refuses_decisions_once_a_cycle_is_locked() {
    let h = Harness::new();
    let cycle = h.open_cycle().await;
    let member = Uuid::from_u128(1);

    h.approved(cycle.id, member, TransactionType::SharePurchase, "100", Some(10)).await;
    let pending = h
        .ledger
        .record_transaction(
            h.tenant,
            cycle.id,
            member,
            TransactionType::WelfareContribution,
            BigDecimal::from(40),
            None,
        )
        .await
        .unwrap();

    h.lifecycle.lock_cycle(h.tenant, cycle.id, None).await.unwrap();

    // Even a caller going straight to storage cannot land the approval: the
    // decide operation checks the cycle status atomically with the write, so
    // the frozen totals can never diverge from the ledger.
    let outcome = h
        .repo
        .decide_transaction(h.tenant, pending.id, ApprovalStatus::Approved)
        .await
        .unwrap();
    assert!(matches!(outcome, DecideOutcome::LedgerFrozen(_)));

    let stored = h.repo.transaction_by_id(h.tenant, pending.id).await.unwrap();
    assert_eq!(stored.status, ApprovalStatus::Pending);

    // The cycle remains finalizable afterwards.
    let finalized = h
        .engine
        .finalize_shareout(h.tenant, cycle.id, member)
        .await
        .unwrap();
    assert!(matches!(finalized, ShareoutInsert::Created(_)));
}
