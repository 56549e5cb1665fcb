//! Quota ledger domain (entitlements, movements, consumption, balances).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. Balances
//! are always derived from the rows; nothing here stores a running balance.

pub mod balance;
pub mod consumption;
pub mod entitlement;
pub mod error;
pub mod movement;
pub mod reference;
pub mod status;
pub mod transfer;

pub use balance::{Balance, BalanceCalculator, GroupBalance, LedgerTotals, RiskLevel};
pub use consumption::{Consumption, ConsumptionRequest, ExternalRef};
pub use entitlement::{BalanceKey, Entitlement};
pub use error::{ErrorClass, LedgerError, LedgerResult};
pub use movement::Movement;
pub use reference::{Category, Holder, UnitOfMeasure};
pub use status::{Audit, RecordStatus, Retraction};
pub use transfer::TransferRequest;

/// Upper bound for a single row amount (entitlement, movement or consumption).
///
/// Keeps every aggregate comfortably inside `i64` even across millions of rows.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;
