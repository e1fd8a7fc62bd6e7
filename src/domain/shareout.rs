//! Share-out records: a member's settlement at the end of a cycle.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted share-out row. Unique per (cycle, member), immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shareout {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub cycle_id: Uuid,
    pub member_id: Uuid,
    pub shares_owned: i64,
    pub share_percentage: BigDecimal,
    pub share_value: BigDecimal,
    pub interest_earnings: BigDecimal,
    pub welfare_return: BigDecimal,
    pub gross_entitlement: BigDecimal,
    pub outstanding_loan: BigDecimal,
    pub net_payout: BigDecimal,
    pub created_at: DateTime<Utc>,
}

/// Non-persisted preview of what a member would receive if the cycle were
/// shared out now. Same arithmetic as the persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedShareout {
    pub cycle_id: Uuid,
    pub member_id: Uuid,
    pub shares_owned: i64,
    pub share_percentage: BigDecimal,
    pub share_value: BigDecimal,
    pub interest_earnings: BigDecimal,
    pub welfare_return: BigDecimal,
    pub gross_entitlement: BigDecimal,
    pub outstanding_loan: BigDecimal,
    pub net_payout: BigDecimal,
}

impl ExpectedShareout {
    /// Materialize the preview as a persistable row.
    pub fn into_shareout(self, tenant_id: Uuid) -> Shareout {
        Shareout {
            id: Uuid::new_v4(),
            tenant_id,
            cycle_id: self.cycle_id,
            member_id: self.member_id,
            shares_owned: self.shares_owned,
            share_percentage: self.share_percentage,
            share_value: self.share_value,
            interest_earnings: self.interest_earnings,
            welfare_return: self.welfare_return,
            gross_entitlement: self.gross_entitlement,
            outstanding_loan: self.outstanding_loan,
            net_payout: self.net_payout,
            created_at: Utc::now(),
        }
    }
}
