//! Caller-facing ledger error taxonomy.

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// How a failure should be treated by callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Permanent and deterministic; surfaced verbatim, never retried.
    Validation,
    /// Row id does not exist within the caller's tenant.
    NotFound,
    /// Capability check failed.
    Authorization,
    /// Transient per-key serialization failure; safe to retry with backoff.
    Contention,
    /// Security fault. Logged loudly, surfaced generically.
    Isolation,
    /// Storage/connectivity failure; no partial write occurred.
    Unavailable,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("source and destination holder must differ ({holder})")]
    SameHolder { holder: String },

    #[error("amount must be positive and within the row limit, got {amount}")]
    InvalidAmount { amount: i64 },

    #[error("category '{category}' is not transferable")]
    NonTransferableCategory { category: String },

    #[error("unknown category '{category}'")]
    UnknownCategory { category: String },

    #[error("unknown or inactive holder '{holder}'")]
    UnknownHolder { holder: String },

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("external reference '{external_ref}' already recorded")]
    DuplicateReference { external_ref: String },

    #[error("entitlement already opened for {key}")]
    DuplicateEntitlement { key: String },

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("not found")]
    NotFound,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("contention on {key}; try again")]
    Contention { key: String },

    #[error("cross-tenant access denied")]
    CrossTenantAccess,

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::SameHolder { .. }
            | LedgerError::InvalidAmount { .. }
            | LedgerError::NonTransferableCategory { .. }
            | LedgerError::UnknownCategory { .. }
            | LedgerError::UnknownHolder { .. }
            | LedgerError::InsufficientBalance { .. }
            | LedgerError::DuplicateReference { .. }
            | LedgerError::DuplicateEntitlement { .. }
            | LedgerError::Malformed(_) => ErrorClass::Validation,
            LedgerError::NotFound => ErrorClass::NotFound,
            LedgerError::Forbidden(_) => ErrorClass::Authorization,
            LedgerError::Contention { .. } => ErrorClass::Contention,
            LedgerError::CrossTenantAccess => ErrorClass::Isolation,
            LedgerError::Unavailable(_) => ErrorClass::Unavailable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Contention
    }

    /// Stable machine-readable code for adapters.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::SameHolder { .. } => "same_holder",
            LedgerError::InvalidAmount { .. } => "invalid_amount",
            LedgerError::NonTransferableCategory { .. } => "non_transferable_category",
            LedgerError::UnknownCategory { .. } => "unknown_category",
            LedgerError::UnknownHolder { .. } => "unknown_holder",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::DuplicateReference { .. } => "duplicate_reference",
            LedgerError::DuplicateEntitlement { .. } => "duplicate_entitlement",
            LedgerError::Malformed(_) => "malformed",
            LedgerError::NotFound => "not_found",
            LedgerError::Forbidden(_) => "forbidden",
            LedgerError::Contention { .. } => "try_again",
            LedgerError::CrossTenantAccess => "not_found",
            LedgerError::Unavailable(_) => "unavailable",
        }
    }
}

impl From<quotaledger_core::DomainError> for LedgerError {
    fn from(value: quotaledger_core::DomainError) -> Self {
        LedgerError::Malformed(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_contention_is_retryable() {
        assert!(LedgerError::Contention { key: "k".into() }.is_retryable());
        assert!(!LedgerError::InsufficientBalance { available: 1, requested: 2 }.is_retryable());
        assert!(!LedgerError::CrossTenantAccess.is_retryable());
        assert!(!LedgerError::unavailable("db down").is_retryable());
    }

    #[test]
    fn isolation_errors_carry_no_detail() {
        let err = LedgerError::CrossTenantAccess;
        assert_eq!(err.class(), ErrorClass::Isolation);
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.to_string(), "cross-tenant access denied");
    }
}
