//! Reference data boundary (holders, categories).
//!
//! The ledger only reads from here. Rosters and catalogs are maintained by an
//! external reference service; this module is its read port.

pub mod postgres;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use quotaledger_core::{CategoryCode, HolderId, TenantId};
use quotaledger_ledger::{Category, Holder};

use crate::store::StoreError;

pub use postgres::PostgresReferenceDirectory;

#[async_trait::async_trait]
pub trait ReferenceDirectory: Send + Sync {
    async fn holder(&self, tenant_id: TenantId, id: &HolderId) -> Result<Option<Holder>, StoreError>;

    async fn holders(&self, tenant_id: TenantId) -> Result<Vec<Holder>, StoreError>;

    /// The tenant's own category, or the shared-reference one with that code.
    async fn category(&self, tenant_id: TenantId, code: &CategoryCode) -> Result<Option<Category>, StoreError>;
}

#[async_trait::async_trait]
impl<R> ReferenceDirectory for Arc<R>
where
    R: ReferenceDirectory + ?Sized,
{
    async fn holder(&self, tenant_id: TenantId, id: &HolderId) -> Result<Option<Holder>, StoreError> {
        (**self).holder(tenant_id, id).await
    }

    async fn holders(&self, tenant_id: TenantId) -> Result<Vec<Holder>, StoreError> {
        (**self).holders(tenant_id).await
    }

    async fn category(&self, tenant_id: TenantId, code: &CategoryCode) -> Result<Option<Category>, StoreError> {
        (**self).category(tenant_id, code).await
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReferenceDirectory {
    holders: RwLock<HashMap<(TenantId, HolderId), Holder>>,
    categories: RwLock<HashMap<(Option<TenantId>, CategoryCode), Category>>,
}

impl InMemoryReferenceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_holder(&self, holder: Holder) {
        if let Ok(mut map) = self.holders.write() {
            map.insert((holder.tenant_id, holder.id.clone()), holder);
        }
    }

    pub fn upsert_category(&self, category: Category) {
        if let Ok(mut map) = self.categories.write() {
            map.insert((category.tenant_id, category.code.clone()), category);
        }
    }
}

#[async_trait::async_trait]
impl ReferenceDirectory for InMemoryReferenceDirectory {
    async fn holder(&self, tenant_id: TenantId, id: &HolderId) -> Result<Option<Holder>, StoreError> {
        let map = self
            .holders
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(map.get(&(tenant_id, id.clone())).cloned())
    }

    async fn holders(&self, tenant_id: TenantId) -> Result<Vec<Holder>, StoreError> {
        let map = self
            .holders
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        let mut out: Vec<Holder> = map
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, h)| h.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn category(&self, tenant_id: TenantId, code: &CategoryCode) -> Result<Option<Category>, StoreError> {
        let map = self
            .categories
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(map
            .get(&(Some(tenant_id), code.clone()))
            .or_else(|| map.get(&(None, code.clone())))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotaledger_ledger::UnitOfMeasure;

    fn category(tenant: Option<TenantId>, code: &str, transferable: bool) -> Category {
        Category {
            tenant_id: tenant,
            code: CategoryCode::parse(code).unwrap(),
            name: None,
            transferable,
            unit: UnitOfMeasure::Mass,
        }
    }

    #[tokio::test]
    async fn tenant_category_shadows_shared_reference() {
        let dir = InMemoryReferenceDirectory::new();
        let t = TenantId::new();
        dir.upsert_category(category(None, "HAL", false));
        dir.upsert_category(category(Some(t), "HAL", true));

        let own = dir.category(t, &CategoryCode::parse("HAL").unwrap()).await.unwrap().unwrap();
        assert!(own.transferable);

        let other = dir
            .category(TenantId::new(), &CategoryCode::parse("HAL").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(other.is_shared_reference());
    }

    #[tokio::test]
    async fn holders_are_listed_per_tenant() {
        let dir = InMemoryReferenceDirectory::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        for (t, code) in [(a, "V-2"), (a, "V-1"), (b, "V-9")] {
            dir.upsert_holder(Holder {
                tenant_id: t,
                id: HolderId::parse(code).unwrap(),
                name: None,
                group: None,
                active: true,
            });
        }

        let ids: Vec<String> = dir.holders(a).await.unwrap().into_iter().map(|h| h.id.to_string()).collect();
        assert_eq!(ids, vec!["V-1", "V-2"]);
        assert!(dir.holder(b, &HolderId::parse("V-1").unwrap()).await.unwrap().is_none());
    }
}
