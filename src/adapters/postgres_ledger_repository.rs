//! Postgres implementation of the ledger repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{ApprovalStatus, Cycle, CycleStatus, Shareout, Transaction};
use crate::ports::{
    CycleLockOutcome, DecideOutcome, LedgerRepository, RepositoryError, RepositoryResult,
    ShareoutInsert,
};
use crate::services::aggregator::{group_by_member, CycleTotals};

#[derive(Clone)]
pub struct PostgresLedgerRepository {
    pool: PgPool,
}

impl PostgresLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    async fn insert_transaction(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO vsla_transactions (
                id, tenant_id, cycle_id, member_id, transaction_type,
                amount, share_count, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(tx.tenant_id)
        .bind(tx.cycle_id)
        .bind(tx.member_id)
        .bind(tx.transaction_type)
        .bind(&tx.amount)
        .bind(tx.share_count)
        .bind(tx.status)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row)
    }

    async fn transaction_by_id(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<Transaction> {
        sqlx::query_as::<_, Transaction>(
            "SELECT * FROM vsla_transactions WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))
    }

    // The transaction row is taken FOR UPDATE (serializes double-decides)
    // and the cycle row FOR SHARE: concurrent decisions on one cycle don't
    // block each other, but lock_cycle's FOR UPDATE waits for every in-flight
    // decision and vice versa, so no approval commits after the freeze.
    async fn decide_transaction(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        decision: ApprovalStatus,
    ) -> RepositoryResult<DecideOutcome> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let row = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM vsla_transactions WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))?;

        if row.status != ApprovalStatus::Pending {
            db_tx.rollback().await.map_err(RepositoryError::from)?;
            return Ok(DecideOutcome::AlreadyDecided(row));
        }

        let cycle = sqlx::query_as::<_, Cycle>(
            "SELECT * FROM vsla_cycles WHERE tenant_id = $1 AND id = $2 FOR SHARE",
        )
        .bind(tenant_id)
        .bind(row.cycle_id)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::NotFound(format!("cycle {}", row.cycle_id)))?;

        if cycle.status != CycleStatus::Active {
            db_tx.rollback().await.map_err(RepositoryError::from)?;
            return Ok(DecideOutcome::LedgerFrozen(cycle));
        }

        let updated = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE vsla_transactions
            SET status = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(decision)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;

        db_tx.commit().await.map_err(RepositoryError::from)?;
        Ok(DecideOutcome::Decided(updated))
    }

    async fn approved_for_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> RepositoryResult<Vec<Transaction>> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM vsla_transactions
            WHERE tenant_id = $1 AND cycle_id = $2 AND status = 'approved'
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn approved_for_member(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
    ) -> RepositoryResult<Vec<Transaction>> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM vsla_transactions
            WHERE tenant_id = $1 AND cycle_id = $2 AND member_id = $3
              AND status = 'approved'
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .bind(cycle_id)
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn insert_cycle(&self, cycle: &Cycle) -> RepositoryResult<Cycle> {
        sqlx::query_as::<_, Cycle>(
            r#"
            INSERT INTO vsla_cycles (
                id, tenant_id, name, start_date, end_date, status,
                total_shares_count, total_shares_contributed,
                total_welfare_contributed, total_penalties_collected,
                total_loan_interest_earned, total_loans_issued,
                total_loans_repaid, total_available_for_shareout,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(cycle.id)
        .bind(cycle.tenant_id)
        .bind(&cycle.name)
        .bind(cycle.start_date)
        .bind(cycle.end_date)
        .bind(cycle.status)
        .bind(cycle.total_shares_count)
        .bind(&cycle.total_shares_contributed)
        .bind(&cycle.total_welfare_contributed)
        .bind(&cycle.total_penalties_collected)
        .bind(&cycle.total_loan_interest_earned)
        .bind(&cycle.total_loans_issued)
        .bind(&cycle.total_loans_repaid)
        .bind(&cycle.total_available_for_shareout)
        .bind(cycle.created_at)
        .bind(cycle.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn cycle_by_id(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<Cycle> {
        sqlx::query_as::<_, Cycle>("SELECT * FROM vsla_cycles WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?
            .ok_or_else(|| RepositoryError::NotFound(format!("cycle {id}")))
    }

    async fn update_cycle(&self, cycle: &Cycle) -> RepositoryResult<Cycle> {
        sqlx::query_as::<_, Cycle>(
            r#"
            UPDATE vsla_cycles SET
                name = $3, start_date = $4, end_date = $5, status = $6,
                total_shares_count = $7, total_shares_contributed = $8,
                total_welfare_contributed = $9, total_penalties_collected = $10,
                total_loan_interest_earned = $11, total_loans_issued = $12,
                total_loans_repaid = $13, total_available_for_shareout = $14,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(cycle.tenant_id)
        .bind(cycle.id)
        .bind(&cycle.name)
        .bind(cycle.start_date)
        .bind(cycle.end_date)
        .bind(cycle.status)
        .bind(cycle.total_shares_count)
        .bind(&cycle.total_shares_contributed)
        .bind(&cycle.total_welfare_contributed)
        .bind(&cycle.total_penalties_collected)
        .bind(&cycle.total_loan_interest_earned)
        .bind(&cycle.total_loans_issued)
        .bind(&cycle.total_loans_repaid)
        .bind(&cycle.total_available_for_shareout)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::NotFound(format!("cycle {}", cycle.id)))
    }

    // Exclusive hold on the cycle row across the aggregate scan and the
    // status flip; the scan therefore sees every committed decision and no
    // further ones can land until the freeze commits.
    async fn lock_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        end_date: DateTime<Utc>,
    ) -> RepositoryResult<CycleLockOutcome> {
        let mut db_tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let mut cycle = sqlx::query_as::<_, Cycle>(
            "SELECT * FROM vsla_cycles WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(cycle_id)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::NotFound(format!("cycle {cycle_id}")))?;

        if cycle.status != CycleStatus::Active {
            db_tx.rollback().await.map_err(RepositoryError::from)?;
            return Ok(CycleLockOutcome::NotActive(cycle));
        }

        let approved = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM vsla_transactions
            WHERE tenant_id = $1 AND cycle_id = $2 AND status = 'approved'
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .bind(cycle_id)
        .fetch_all(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;

        let totals = CycleTotals::from_contributions(&group_by_member(&approved));
        if !totals.reconciles() {
            db_tx.rollback().await.map_err(RepositoryError::from)?;
            return Ok(CycleLockOutcome::Unreconciled(format!(
                "cycle {cycle_id} totals do not reconcile at lock"
            )));
        }

        totals.freeze_onto(&mut cycle, end_date);
        let updated = sqlx::query_as::<_, Cycle>(
            r#"
            UPDATE vsla_cycles SET
                end_date = $3, status = $4,
                total_shares_count = $5, total_shares_contributed = $6,
                total_welfare_contributed = $7, total_penalties_collected = $8,
                total_loan_interest_earned = $9, total_loans_issued = $10,
                total_loans_repaid = $11, total_available_for_shareout = $12,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(cycle_id)
        .bind(cycle.end_date)
        .bind(cycle.status)
        .bind(cycle.total_shares_count)
        .bind(&cycle.total_shares_contributed)
        .bind(&cycle.total_welfare_contributed)
        .bind(&cycle.total_penalties_collected)
        .bind(&cycle.total_loan_interest_earned)
        .bind(&cycle.total_loans_issued)
        .bind(&cycle.total_loans_repaid)
        .bind(&cycle.total_available_for_shareout)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(RepositoryError::from)?;

        db_tx.commit().await.map_err(RepositoryError::from)?;
        Ok(CycleLockOutcome::Locked(updated))
    }

    async fn insert_shareout(&self, shareout: &Shareout) -> RepositoryResult<ShareoutInsert> {
        // Single atomic statement under the (cycle_id, member_id) unique
        // constraint; a concurrent winner leaves us fetching its row.
        let inserted = sqlx::query_as::<_, Shareout>(
            r#"
            INSERT INTO vsla_shareouts (
                id, tenant_id, cycle_id, member_id, shares_owned,
                share_percentage, share_value, interest_earnings,
                welfare_return, gross_entitlement, outstanding_loan,
                net_payout, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (cycle_id, member_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(shareout.id)
        .bind(shareout.tenant_id)
        .bind(shareout.cycle_id)
        .bind(shareout.member_id)
        .bind(shareout.shares_owned)
        .bind(&shareout.share_percentage)
        .bind(&shareout.share_value)
        .bind(&shareout.interest_earnings)
        .bind(&shareout.welfare_return)
        .bind(&shareout.gross_entitlement)
        .bind(&shareout.outstanding_loan)
        .bind(&shareout.net_payout)
        .bind(shareout.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match inserted {
            Some(row) => Ok(ShareoutInsert::Created(row)),
            None => self
                .shareout_for_member(shareout.tenant_id, shareout.cycle_id, shareout.member_id)
                .await?
                .map(ShareoutInsert::Existing)
                .ok_or_else(|| {
                    RepositoryError::Conflict(format!(
                        "shareout for cycle {} member {} conflicted but is missing",
                        shareout.cycle_id, shareout.member_id
                    ))
                }),
        }
    }

    async fn shareout_for_member(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
    ) -> RepositoryResult<Option<Shareout>> {
        sqlx::query_as::<_, Shareout>(
            r#"
            SELECT * FROM vsla_shareouts
            WHERE tenant_id = $1 AND cycle_id = $2 AND member_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(cycle_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn shareouts_for_cycle(
        &self,
        tenant_id: Uuid,
        cycle_id: Uuid,
    ) -> RepositoryResult<Vec<Shareout>> {
        sqlx::query_as::<_, Shareout>(
            r#"
            SELECT * FROM vsla_shareouts
            WHERE tenant_id = $1 AND cycle_id = $2
            ORDER BY member_id
            "#,
        )
        .bind(tenant_id)
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }
}
