//! Tenant isolation guard.
//!
//! Every ledger data access goes through [`TenantGuard`] with the caller's
//! tenant. Rows are fetched, then their owner is compared with that tenant; a
//! mismatch is a fatal [`LedgerError::CrossTenantAccess`], logged on the
//! `security` target, and never a silent filter. The only exemption is
//! shared-reference categories (`tenant_id == None`), which are reference
//! data and never ledger rows.

use chrono::{DateTime, Utc};

use quotaledger_core::{CategoryCode, ConsumptionId, HolderId, MovementId, Period, TenantId, TenantScoped, UserId};
use quotaledger_ledger::{
    Balance, BalanceKey, Category, Consumption, Entitlement, Holder, LedgerError, LedgerResult, Movement,
    Retraction,
};

use crate::reference::ReferenceDirectory;
use crate::store::{LedgerStore, StoreError};

fn violation(tenant: TenantId, owner: Option<TenantId>, resource: &str) -> LedgerError {
    tracing::error!(
        target: "security",
        tenant_id = %tenant,
        owner_tenant_id = ?owner.map(|t| t.to_string()),
        resource,
        "cross-tenant access refused"
    );
    LedgerError::CrossTenantAccess
}

fn ensure_scoped<T: TenantScoped>(tenant: TenantId, row: &T, resource: &str) -> LedgerResult<()> {
    if row.belongs_to(tenant) {
        Ok(())
    } else {
        Err(violation(tenant, Some(row.tenant_id()), resource))
    }
}

fn ensure_all_scoped<T: TenantScoped>(tenant: TenantId, rows: &[T], resource: &str) -> LedgerResult<()> {
    rows.iter().try_for_each(|row| ensure_scoped(tenant, row, resource))
}

#[derive(Debug, Clone)]
pub struct TenantGuard<S, R> {
    store: S,
    directory: R,
}

impl<S, R> TenantGuard<S, R>
where
    S: LedgerStore,
    R: ReferenceDirectory,
{
    pub fn new(store: S, directory: R) -> Self {
        Self { store, directory }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &R {
        &self.directory
    }

    fn lift(&self, tenant: TenantId, resource: &str, err: StoreError) -> LedgerError {
        match err {
            StoreError::TenantIsolation(_) => violation(tenant, None, resource),
            other => other.into(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reference data
    // ─────────────────────────────────────────────────────────────────────

    pub async fn holder(&self, tenant: TenantId, id: &HolderId) -> LedgerResult<Option<Holder>> {
        let found = self
            .directory
            .holder(tenant, id)
            .await
            .map_err(|e| self.lift(tenant, "holder", e))?;
        if let Some(holder) = &found {
            ensure_scoped(tenant, holder, "holder")?;
        }
        Ok(found)
    }

    pub async fn holders(&self, tenant: TenantId) -> LedgerResult<Vec<Holder>> {
        let holders = self
            .directory
            .holders(tenant)
            .await
            .map_err(|e| self.lift(tenant, "holder", e))?;
        ensure_all_scoped(tenant, &holders, "holder")?;
        Ok(holders)
    }

    pub async fn category(&self, tenant: TenantId, code: &CategoryCode) -> LedgerResult<Option<Category>> {
        let found = self
            .directory
            .category(tenant, code)
            .await
            .map_err(|e| self.lift(tenant, "category", e))?;
        if let Some(category) = &found {
            if !category.visible_to(tenant) {
                return Err(violation(tenant, category.tenant_id, "category"));
            }
        }
        Ok(found)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Entitlements and balances
    // ─────────────────────────────────────────────────────────────────────

    pub async fn entitlement(&self, tenant: TenantId, key: &BalanceKey) -> LedgerResult<Option<Entitlement>> {
        ensure_scoped(tenant, key, "entitlement")?;
        let found = self
            .store
            .entitlement(key)
            .await
            .map_err(|e| self.lift(tenant, "entitlement", e))?;
        if let Some(e) = &found {
            ensure_scoped(tenant, e, "entitlement")?;
        }
        Ok(found)
    }

    pub async fn open_entitlement(&self, tenant: TenantId, entitlement: Entitlement) -> LedgerResult<()> {
        ensure_scoped(tenant, &entitlement, "entitlement")?;
        self.store
            .insert_entitlement(entitlement)
            .await
            .map_err(|e| self.lift(tenant, "entitlement", e))
    }

    pub async fn correct_entitlement(
        &self,
        tenant: TenantId,
        key: &BalanceKey,
        amount: i64,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> LedgerResult<Entitlement> {
        ensure_scoped(tenant, key, "entitlement")?;
        self.store
            .correct_entitlement(key, amount, actor, at)
            .await
            .map_err(|e| self.lift(tenant, "entitlement", e))
    }

    pub async fn balance(&self, tenant: TenantId, key: &BalanceKey) -> LedgerResult<Balance> {
        ensure_scoped(tenant, key, "balance")?;
        self.store
            .balance(key)
            .await
            .map_err(|e| self.lift(tenant, "balance", e))
    }

    pub async fn period_balances(&self, tenant: TenantId, period: Period) -> LedgerResult<Vec<Balance>> {
        self.store
            .period_balances(tenant, period)
            .await
            .map_err(|e| self.lift(tenant, "balance", e))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Movement log
    // ─────────────────────────────────────────────────────────────────────

    pub async fn append_movement(&self, tenant: TenantId, movement: Movement) -> LedgerResult<()> {
        ensure_scoped(tenant, &movement, "movement")?;
        self.store
            .append_movement(movement)
            .await
            .map_err(|e| self.lift(tenant, "movement", e))
    }

    /// Fetch by id; a foreign id is refused, an unknown one is `NotFound`.
    pub async fn movement(&self, tenant: TenantId, id: MovementId) -> LedgerResult<Movement> {
        let movement = self
            .store
            .movement(id)
            .await
            .map_err(|e| self.lift(tenant, "movement", e))?
            .ok_or(LedgerError::NotFound)?;
        ensure_scoped(tenant, &movement, "movement")?;
        Ok(movement)
    }

    pub async fn retract_movement(
        &self,
        tenant: TenantId,
        id: MovementId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> LedgerResult<Retraction> {
        self.movement(tenant, id).await?;
        self.store
            .retract_movement(tenant, id, actor, at)
            .await
            .map_err(|e| self.lift(tenant, "movement", e))
    }

    pub async fn movements(&self, tenant: TenantId, period: Period, include_deleted: bool) -> LedgerResult<Vec<Movement>> {
        let rows = self
            .store
            .movements(tenant, period, include_deleted)
            .await
            .map_err(|e| self.lift(tenant, "movement", e))?;
        ensure_all_scoped(tenant, &rows, "movement")?;
        Ok(rows)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Consumption log
    // ─────────────────────────────────────────────────────────────────────

    pub async fn append_consumption(&self, tenant: TenantId, consumption: Consumption) -> LedgerResult<()> {
        ensure_scoped(tenant, &consumption, "consumption")?;
        self.store
            .append_consumption(consumption)
            .await
            .map_err(|e| self.lift(tenant, "consumption", e))
    }

    pub async fn consumption(&self, tenant: TenantId, id: ConsumptionId) -> LedgerResult<Consumption> {
        let consumption = self
            .store
            .consumption(id)
            .await
            .map_err(|e| self.lift(tenant, "consumption", e))?
            .ok_or(LedgerError::NotFound)?;
        ensure_scoped(tenant, &consumption, "consumption")?;
        Ok(consumption)
    }

    pub async fn retract_consumption(
        &self,
        tenant: TenantId,
        id: ConsumptionId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> LedgerResult<Retraction> {
        self.consumption(tenant, id).await?;
        self.store
            .retract_consumption(tenant, id, actor, at)
            .await
            .map_err(|e| self.lift(tenant, "consumption", e))
    }

    pub async fn consumptions(
        &self,
        tenant: TenantId,
        period: Period,
        holder: Option<&HolderId>,
    ) -> LedgerResult<Vec<Consumption>> {
        let rows = self
            .store
            .consumptions(tenant, period, holder)
            .await
            .map_err(|e| self.lift(tenant, "consumption", e))?;
        ensure_all_scoped(tenant, &rows, "consumption")?;
        Ok(rows)
    }
}
