use std::sync::Arc;

use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use quotaledger_core::{CategoryCode, GroupId, HolderId, TenantId};
use quotaledger_ledger::{Category, Holder, UnitOfMeasure};

use super::ReferenceDirectory;
use crate::store::StoreError;

/// Read-only view over the reference service's `holders` and `categories`
/// tables.
#[derive(Debug, Clone)]
pub struct PostgresReferenceDirectory {
    pool: Arc<PgPool>,
}

impl PostgresReferenceDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn unavailable(operation: &str, err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(format!("sqlx error in {operation}: {err}"))
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn holder_from_row(row: &PgRow) -> Result<Holder, StoreError> {
    let tenant_id: uuid::Uuid = row.try_get("tenant_id").map_err(corrupt)?;
    let id: String = row.try_get("id").map_err(corrupt)?;
    let group: Option<String> = row.try_get("group_id").map_err(corrupt)?;
    Ok(Holder {
        tenant_id: TenantId::from_uuid(tenant_id),
        id: HolderId::parse(&id).map_err(corrupt)?,
        name: row.try_get("name").map_err(corrupt)?,
        group: group.as_deref().map(|g| GroupId::parse(g)).transpose().map_err(corrupt)?,
        active: row.try_get("active").map_err(corrupt)?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category, StoreError> {
    let tenant_id: Option<uuid::Uuid> = row.try_get("tenant_id").map_err(corrupt)?;
    let code: String = row.try_get("code").map_err(corrupt)?;
    let unit: String = row.try_get("unit").map_err(corrupt)?;
    Ok(Category {
        tenant_id: tenant_id.map(TenantId::from_uuid),
        code: CategoryCode::parse(&code).map_err(corrupt)?,
        name: row.try_get("name").map_err(corrupt)?,
        transferable: row.try_get("transferable").map_err(corrupt)?,
        unit: match unit.as_str() {
            "mass" => UnitOfMeasure::Mass,
            "count" => UnitOfMeasure::Count,
            other => return Err(corrupt(format!("unknown unit '{other}'"))),
        },
    })
}

#[async_trait::async_trait]
impl ReferenceDirectory for PostgresReferenceDirectory {
    async fn holder(&self, tenant_id: TenantId, id: &HolderId) -> Result<Option<Holder>, StoreError> {
        let row = sqlx::query(
            "SELECT tenant_id, id, name, group_id, active FROM holders WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| unavailable("load_holder", e))?;

        row.as_ref().map(holder_from_row).transpose()
    }

    async fn holders(&self, tenant_id: TenantId) -> Result<Vec<Holder>, StoreError> {
        let rows = sqlx::query(
            "SELECT tenant_id, id, name, group_id, active FROM holders WHERE tenant_id = $1 ORDER BY id ASC",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| unavailable("list_holders", e))?;

        rows.iter().map(holder_from_row).collect()
    }

    async fn category(&self, tenant_id: TenantId, code: &CategoryCode) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, code, name, transferable, unit
            FROM categories
            WHERE code = $2 AND (tenant_id = $1 OR tenant_id IS NULL)
            ORDER BY tenant_id NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(code.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| unavailable("load_category", e))?;

        row.as_ref().map(category_from_row).transpose()
    }
}
