//! Storage wiring: picks the Postgres or in-memory ledger from config.

use std::sync::Arc;

use quotaledger_infra::{
    InMemoryLedgerStore, InMemoryReferenceDirectory, LedgerConfig, LedgerService, LedgerStore,
    PostgresLedgerStore, PostgresReferenceDirectory, ReferenceDirectory,
};

/// Ledger facade over type-erased storage, shared by every handler.
pub type Ledger = LedgerService<Arc<dyn LedgerStore>, Arc<dyn ReferenceDirectory>>;

#[derive(Clone)]
pub struct AppServices {
    pub ledger: Arc<Ledger>,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>, directory: Arc<dyn ReferenceDirectory>, config: &LedgerConfig) -> Self {
        Self {
            ledger: Arc::new(LedgerService::new(store, directory, config.retry)),
        }
    }

    /// In-memory ledger over a caller-provided directory (dev and tests).
    pub fn in_memory(directory: Arc<InMemoryReferenceDirectory>, config: &LedgerConfig) -> Self {
        let store = Arc::new(InMemoryLedgerStore::new(config.lock_timeout));
        Self::new(store, directory, config)
    }
}

/// Build services from config: Postgres when `DATABASE_URL` is set, otherwise
/// an empty in-memory ledger.
pub async fn build_services(config: &LedgerConfig) -> anyhow::Result<AppServices> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresLedgerStore::connect(url, config.lock_timeout).await?;
            store.ensure_schema().await?;
            let directory = PostgresReferenceDirectory::new(store.pool().clone());
            tracing::info!("ledger storage: postgres");
            Ok(AppServices::new(Arc::new(store), Arc::new(directory), config))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory ledger");
            Ok(AppServices::in_memory(Arc::new(InMemoryReferenceDirectory::new()), config))
        }
    }
}
