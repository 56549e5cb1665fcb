//! Write path for harvest events.
//!
//! Consumption is never blocked by balance (overage is allowed). It still
//! takes the key's serialization so a concurrent transfer never validates
//! against a pre-harvest balance.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use quotaledger_core::{ConsumptionId, TenantId, UserId};
use quotaledger_ledger::{Consumption, ConsumptionRequest, LedgerError, LedgerResult, Retraction};

use crate::guard::TenantGuard;
use crate::reference::ReferenceDirectory;
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;

pub struct ConsumptionRecorder<S, R> {
    guard: Arc<TenantGuard<S, R>>,
    retry: RetryPolicy,
}

impl<S, R> ConsumptionRecorder<S, R>
where
    S: LedgerStore,
    R: ReferenceDirectory,
{
    pub fn new(guard: Arc<TenantGuard<S, R>>, retry: RetryPolicy) -> Self {
        Self { guard, retry }
    }

    #[instrument(
        skip(self, request),
        fields(
            tenant_id = %tenant,
            holder = %request.holder,
            category = %request.category,
            amount = request.amount,
            external_ref = %request.external_ref
        ),
        err
    )]
    pub async fn record(
        &self,
        tenant: TenantId,
        request: &ConsumptionRequest,
        actor: UserId,
    ) -> LedgerResult<ConsumptionId> {
        let id = self
            .retry
            .run("record_consumption", || self.attempt(tenant, request, actor))
            .await?;
        tracing::info!(consumption_id = %id, "consumption recorded");
        Ok(id)
    }

    async fn attempt(&self, tenant: TenantId, request: &ConsumptionRequest, actor: UserId) -> LedgerResult<ConsumptionId> {
        request.validate_shape()?;

        self.guard
            .category(tenant, &request.category)
            .await?
            .filter(|c| c.visible_to(tenant))
            .ok_or_else(|| LedgerError::UnknownCategory {
                category: request.category.to_string(),
            })?;

        // Inactive holders still harvest what they landed.
        self.guard
            .holder(tenant, &request.holder)
            .await?
            .ok_or_else(|| LedgerError::UnknownHolder {
                holder: request.holder.to_string(),
            })?;

        let consumption = Consumption::record(tenant, request, actor, Utc::now())?;
        let id = consumption.id;
        self.guard.append_consumption(tenant, consumption).await?;
        Ok(id)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant, consumption_id = %id), err)]
    pub async fn retract(&self, tenant: TenantId, id: ConsumptionId, actor: UserId) -> LedgerResult<Retraction> {
        let outcome = self
            .retry
            .run("retract_consumption", || {
                self.guard.retract_consumption(tenant, id, actor, Utc::now())
            })
            .await?;
        tracing::info!(?outcome, "consumption retraction");
        Ok(outcome)
    }
}
