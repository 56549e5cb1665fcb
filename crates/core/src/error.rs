//! Errors raised while constructing primitive values.

use thiserror::Error;

/// Parse/range failure of an identifier, code or period.
///
/// Ledger business rules live in `quotaledger_ledger::LedgerError`, which
/// absorbs these as `Malformed`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("out of range: {0}")]
    OutOfRange(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }
}
