//! Typed notification templates.
//!
//! The message body is rendered from a closed set of named fields rather
//! than ad-hoc string placeholder substitution; delivery (email/SMS) is the
//! caller's concern.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Fields available to the share-out notice template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareoutNotice {
    pub member_name: String,
    pub group_name: String,
    pub cycle_name: String,
    pub shares_owned: i64,
    pub net_payout: BigDecimal,
    pub currency: String,
}

impl ShareoutNotice {
    pub fn render(&self) -> String {
        format!(
            "Dear {member}, the {cycle} share-out for {group} is complete. \
             Your {shares} share(s) entitle you to a payout of {currency} {amount}.",
            member = self.member_name,
            cycle = self.cycle_name,
            group = self.group_name,
            shares = self.shares_owned,
            currency = self.currency,
            amount = self.net_payout.with_scale(2),
        )
    }
}
