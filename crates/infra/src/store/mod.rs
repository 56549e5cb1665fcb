//! Ledger storage boundary.
//!
//! Stores own the atomic write paths: the balance re-check and the row insert
//! happen under one per-key serialization inside the store, never as two
//! separate calls from the outside.

pub mod in_memory;
pub mod key_lock;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use key_lock::{KeyGuard, KeyLocks};
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, StoreError};
