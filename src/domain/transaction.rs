//! Ledger transaction domain entity.
//! One append-only row per member action within a cycle.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Category of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    SharePurchase,
    WelfareContribution,
    PenaltyFine,
    LoanIssuance,
    LoanRepayment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::SharePurchase => "share_purchase",
            TransactionType::WelfareContribution => "welfare_contribution",
            TransactionType::PenaltyFine => "penalty_fine",
            TransactionType::LoanIssuance => "loan_issuance",
            TransactionType::LoanRepayment => "loan_repayment",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "share_purchase" => Ok(TransactionType::SharePurchase),
            "welfare_contribution" => Ok(TransactionType::WelfareContribution),
            "penalty_fine" => Ok(TransactionType::PenaltyFine),
            "loan_issuance" => Ok(TransactionType::LoanIssuance),
            "loan_repayment" => Ok(TransactionType::LoanRepayment),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Approval state of a ledger entry. Only `Approved` rows feed aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Domain entity representing a ledger transaction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub cycle_id: Uuid,
    pub member_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    pub share_count: Option<i64>,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        tenant_id: Uuid,
        cycle_id: Uuid,
        member_id: Uuid,
        transaction_type: TransactionType,
        amount: BigDecimal,
        share_count: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            cycle_id,
            member_id,
            transaction_type,
            amount,
            share_count,
            status: ApprovalStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_transaction_types() {
        for (raw, parsed) in [
            ("share_purchase", TransactionType::SharePurchase),
            ("welfare_contribution", TransactionType::WelfareContribution),
            ("penalty_fine", TransactionType::PenaltyFine),
            ("loan_issuance", TransactionType::LoanIssuance),
            ("loan_repayment", TransactionType::LoanRepayment),
        ] {
            assert_eq!(raw.parse::<TransactionType>().unwrap(), parsed);
            assert_eq!(parsed.to_string(), raw);
        }

        assert!("dividend".parse::<TransactionType>().is_err());
    }

    #[test]
    fn new_transactions_start_pending() {
        let tx = Transaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            TransactionType::SharePurchase,
            BigDecimal::from(100),
            Some(10),
        );
        assert_eq!(tx.status, ApprovalStatus::Pending);
    }
}
