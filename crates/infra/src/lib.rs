//! Infrastructure layer: storage, tenant guard, write paths, config.

pub mod config;
pub mod consumption_recorder;
pub mod guard;
pub mod reference;
pub mod retry;
pub mod service;
pub mod store;
pub mod transfer_executor;


pub use config::{ConfigError, LedgerConfig};
pub use guard::TenantGuard;
pub use reference::{InMemoryReferenceDirectory, PostgresReferenceDirectory, ReferenceDirectory};
pub use retry::RetryPolicy;
pub use service::{HolderActivity, LedgerService};
pub use store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError};
