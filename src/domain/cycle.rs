//! Savings cycle entity and its phase state machine.
//!
//! A cycle moves `active -> locked -> completed` and never backward.
//! While `active` the aggregate columns are advisory (recomputed on demand);
//! they are frozen when the cycle is locked for share-out.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cycle_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Active,
    Locked,
    Completed,
}

impl CycleStatus {
    /// Forward-only transitions. Reopening a completed cycle is forbidden.
    pub fn can_transition_to(self, next: CycleStatus) -> bool {
        matches!(
            (self, next),
            (CycleStatus::Active, CycleStatus::Locked)
                | (CycleStatus::Locked, CycleStatus::Completed)
        )
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleStatus::Active => "active",
            CycleStatus::Locked => "locked",
            CycleStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cycle {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: CycleStatus,
    pub total_shares_count: i64,
    pub total_shares_contributed: BigDecimal,
    pub total_welfare_contributed: BigDecimal,
    pub total_penalties_collected: BigDecimal,
    pub total_loan_interest_earned: BigDecimal,
    pub total_loans_issued: BigDecimal,
    pub total_loans_repaid: BigDecimal,
    pub total_available_for_shareout: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cycle {
    pub fn new(tenant_id: Uuid, name: String, start_date: DateTime<Utc>) -> Self {
        let zero = BigDecimal::from(0);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            start_date,
            end_date: None,
            status: CycleStatus::Active,
            total_shares_count: 0,
            total_shares_contributed: zero.clone(),
            total_welfare_contributed: zero.clone(),
            total_penalties_collected: zero.clone(),
            total_loan_interest_earned: zero.clone(),
            total_loans_issued: zero.clone(),
            total_loans_repaid: zero.clone(),
            total_available_for_shareout: zero,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether new contributions may still be recorded or approved.
    pub fn accepts_contributions(&self) -> bool {
        self.status == CycleStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_only_forward_transitions() {
        assert!(CycleStatus::Active.can_transition_to(CycleStatus::Locked));
        assert!(CycleStatus::Locked.can_transition_to(CycleStatus::Completed));

        assert!(!CycleStatus::Active.can_transition_to(CycleStatus::Completed));
        assert!(!CycleStatus::Locked.can_transition_to(CycleStatus::Active));
        assert!(!CycleStatus::Completed.can_transition_to(CycleStatus::Locked));
        assert!(!CycleStatus::Completed.can_transition_to(CycleStatus::Active));
    }

    #[test]
    fn only_active_cycles_accept_contributions() {
        let mut cycle = Cycle::new(Uuid::new_v4(), "2026 cycle".into(), Utc::now());
        assert!(cycle.accepts_contributions());

        cycle.status = CycleStatus::Locked;
        assert!(!cycle.accepts_contributions());

        cycle.status = CycleStatus::Completed;
        assert!(!cycle.accepts_contributions());
    }
}
