//! Input validation for ledger entries.
//!
//! Monetary amounts are `BigDecimal` end to end; anything that cannot be
//! represented exactly in cents is rejected before it reaches the ledger.

use bigdecimal::BigDecimal;

use crate::domain::TransactionType;
use crate::error::{VslaError, VslaResult};

pub const AMOUNT_MAX_SCALE: i64 = 2;

/// Amount must be non-negative and carry at most two decimal places.
pub fn validate_amount(amount: &BigDecimal) -> VslaResult<()> {
    if amount < &BigDecimal::from(0) {
        return Err(VslaError::InvalidAmount(format!(
            "must not be negative, got {amount}"
        )));
    }

    // with_scale truncates; a value that survives round-tripping through
    // scale 2 has no sub-cent digits.
    if amount != &amount.with_scale(AMOUNT_MAX_SCALE) {
        return Err(VslaError::InvalidAmount(format!(
            "must have at most {AMOUNT_MAX_SCALE} decimal places, got {amount}"
        )));
    }

    Ok(())
}

/// Share counts are required for share purchases and forbidden elsewhere.
pub fn validate_share_count(
    transaction_type: TransactionType,
    share_count: Option<i64>,
) -> VslaResult<()> {
    match (transaction_type, share_count) {
        (TransactionType::SharePurchase, None) => Err(VslaError::InvalidShareCount(
            "share purchase requires a share count".into(),
        )),
        (TransactionType::SharePurchase, Some(count)) if count < 0 => Err(
            VslaError::InvalidShareCount(format!("must not be negative, got {count}")),
        ),
        (TransactionType::SharePurchase, Some(_)) => Ok(()),
        (_, Some(_)) => Err(VslaError::InvalidShareCount(format!(
            "share count is only valid for share purchases, not {transaction_type}"
        ))),
        (_, None) => Ok(()),
    }
}
