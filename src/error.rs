use thiserror::Error;

use crate::ports::RepositoryError;

/// Error taxonomy of the cycle accounting core.
///
/// Validation and eligibility errors are recoverable at the caller boundary;
/// an integrity violation halts finalization of the affected cycle and must
/// be reconciled manually before any payout proceeds.
#[derive(Error, Debug)]
pub enum VslaError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid share count: {0}")]
    InvalidShareCount(String),

    #[error("cycle not eligible: {0}")]
    CycleNotEligible(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("financial integrity violation: {0}")]
    FinancialIntegrityViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub type VslaResult<T> = Result<T, VslaError>;
