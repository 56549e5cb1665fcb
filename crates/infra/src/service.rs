//! Ledger facade: one capability check per call, then the guarded
//! read/write paths.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use quotaledger_auth::{can, Action, Actor, AuthzError, Resource};
use quotaledger_core::{CategoryCode, ConsumptionId, HolderId, MovementId, Period};
use quotaledger_ledger::{
    Balance, BalanceCalculator, BalanceKey, Consumption, ConsumptionRequest, Entitlement, GroupBalance,
    LedgerError, LedgerResult, Movement, Retraction, TransferRequest,
};

use crate::consumption_recorder::ConsumptionRecorder;
use crate::guard::TenantGuard;
use crate::reference::ReferenceDirectory;
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;
use crate::transfer_executor::TransferExecutor;

/// One holder's position and history for a period. Rows newest first,
/// retracted rows excluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolderActivity {
    pub holder: HolderId,
    pub period: Period,
    pub balances: Vec<Balance>,
    pub transfers_in: Vec<Movement>,
    pub transfers_out: Vec<Movement>,
    pub consumptions: Vec<Consumption>,
}

fn authorize(actor: &Actor, action: Action, resource: Resource) -> LedgerResult<()> {
    can(actor, action, &resource).map_err(|e| {
        if e == AuthzError::TenantMismatch {
            tracing::error!(
                target: "security",
                tenant_id = %actor.tenant_id,
                resource_tenant_id = %resource.tenant_id(),
                user_id = %actor.user_id,
                "capability check across tenants"
            );
        } else {
            tracing::debug!(user_id = %actor.user_id, ?action, error = %e, "capability denied");
        }
        LedgerError::Forbidden(e.to_string())
    })
}

pub struct LedgerService<S, R> {
    guard: Arc<TenantGuard<S, R>>,
    transfers: TransferExecutor<S, R>,
    consumption: ConsumptionRecorder<S, R>,
}

impl<S, R> LedgerService<S, R>
where
    S: LedgerStore,
    R: ReferenceDirectory,
{
    pub fn new(store: S, directory: R, retry: RetryPolicy) -> Self {
        let guard = Arc::new(TenantGuard::new(store, directory));
        Self {
            transfers: TransferExecutor::new(guard.clone(), retry),
            consumption: ConsumptionRecorder::new(guard.clone(), retry),
            guard,
        }
    }

    pub fn guard(&self) -> &TenantGuard<S, R> {
        &self.guard
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read API
    // ─────────────────────────────────────────────────────────────────────

    /// Missing entitlement reads as zero.
    pub async fn get_balance(
        &self,
        actor: &Actor,
        holder: &HolderId,
        category: &CategoryCode,
        period: Period,
    ) -> LedgerResult<Balance> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::ReadBalances, Resource::Holder(tenant, holder.clone()))?;
        let key = BalanceKey::new(tenant, holder.clone(), category.clone(), period);
        self.guard.balance(tenant, &key).await
    }

    pub async fn get_balances(&self, actor: &Actor, period: Period) -> LedgerResult<Vec<Balance>> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::ReadBalances, Resource::Tenant(tenant))?;
        self.guard.period_balances(tenant, period).await
    }

    /// Balances rolled up by holder group (cooperative) and category.
    pub async fn get_group_balances(&self, actor: &Actor, period: Period) -> LedgerResult<Vec<GroupBalance>> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::ReadBalances, Resource::Tenant(tenant))?;
        let balances = self.guard.period_balances(tenant, period).await?;
        let holders = self.guard.holders(tenant).await?;
        Ok(BalanceCalculator::group_rollup(&balances, &holders))
    }

    pub async fn get_holder_activity(
        &self,
        actor: &Actor,
        holder: &HolderId,
        period: Period,
    ) -> LedgerResult<HolderActivity> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::ReadActivity, Resource::Holder(tenant, holder.clone()))?;

        let balances = self
            .guard
            .period_balances(tenant, period)
            .await?
            .into_iter()
            .filter(|b| &b.holder == holder)
            .collect();

        let (transfers_in, transfers_out): (Vec<Movement>, Vec<Movement>) = self
            .guard
            .movements(tenant, period, false)
            .await?
            .into_iter()
            .filter(|m| m.involves(holder))
            .partition(|m| &m.destination == holder);

        let consumptions = self.guard.consumptions(tenant, period, Some(holder)).await?;

        Ok(HolderActivity {
            holder: holder.clone(),
            period,
            balances,
            transfers_in,
            transfers_out,
            consumptions,
        })
    }

    /// Audit listing, newest first.
    pub async fn list_movements(&self, actor: &Actor, period: Period, include_deleted: bool) -> LedgerResult<Vec<Movement>> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::ReadActivity, Resource::Tenant(tenant))?;
        self.guard.movements(tenant, period, include_deleted).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Write API
    // ─────────────────────────────────────────────────────────────────────

    pub async fn propose_transfer(&self, actor: &Actor, request: &TransferRequest) -> LedgerResult<MovementId> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::ProposeTransfer, Resource::Holder(tenant, request.source.clone()))?;
        self.transfers.propose(tenant, request, actor.user_id).await
    }

    pub async fn retract_transfer(&self, actor: &Actor, id: MovementId) -> LedgerResult<Retraction> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::RetractTransfer, Resource::Tenant(tenant))?;
        self.transfers.retract(tenant, id, actor.user_id).await
    }

    pub async fn record_consumption(&self, actor: &Actor, request: &ConsumptionRequest) -> LedgerResult<ConsumptionId> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::RecordConsumption, Resource::Holder(tenant, request.holder.clone()))?;
        self.consumption.record(tenant, request, actor.user_id).await
    }

    pub async fn retract_consumption(&self, actor: &Actor, id: ConsumptionId) -> LedgerResult<Retraction> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::RetractConsumption, Resource::Tenant(tenant))?;
        self.consumption.retract(tenant, id, actor.user_id).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Entitlement administration
    // ─────────────────────────────────────────────────────────────────────

    pub async fn open_entitlement(
        &self,
        actor: &Actor,
        holder: &HolderId,
        category: &CategoryCode,
        period: Period,
        amount: i64,
    ) -> LedgerResult<Entitlement> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::ManageEntitlements, Resource::Tenant(tenant))?;

        self.guard
            .holder(tenant, holder)
            .await?
            .ok_or_else(|| LedgerError::UnknownHolder {
                holder: holder.to_string(),
            })?;
        self.guard
            .category(tenant, category)
            .await?
            .ok_or_else(|| LedgerError::UnknownCategory {
                category: category.to_string(),
            })?;

        let key = BalanceKey::new(tenant, holder.clone(), category.clone(), period);
        let entitlement = Entitlement::open(key, amount, actor.user_id, Utc::now())?;
        self.guard.open_entitlement(tenant, entitlement.clone()).await?;
        tracing::info!(key = %entitlement.key, amount, "entitlement opened");
        Ok(entitlement)
    }

    /// Administrative edit of an existing entitlement. Not a movement.
    pub async fn correct_entitlement(
        &self,
        actor: &Actor,
        holder: &HolderId,
        category: &CategoryCode,
        period: Period,
        amount: i64,
    ) -> LedgerResult<Entitlement> {
        let tenant = actor.tenant_id;
        authorize(actor, Action::ManageEntitlements, Resource::Tenant(tenant))?;
        let key = BalanceKey::new(tenant, holder.clone(), category.clone(), period);
        let corrected = self
            .guard
            .correct_entitlement(tenant, &key, amount, actor.user_id, Utc::now())
            .await?;
        tracing::info!(key = %key, amount, "entitlement corrected");
        Ok(corrected)
    }
}
