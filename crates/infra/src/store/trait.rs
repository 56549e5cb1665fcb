use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use quotaledger_core::{ConsumptionId, HolderId, MovementId, Period, TenantId, UserId};
use quotaledger_ledger::{Balance, BalanceKey, Consumption, Entitlement, LedgerError, Movement, Retraction};

/// Storage operation error.
///
/// These are infrastructure errors. Domain rejections detected inside an
/// atomic write (insufficient balance, duplicate reference) travel through
/// [`StoreError::Rejected`] unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("per-key serialization not acquired for {key}")]
    Contention { key: String },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("row not found")]
    NotFound,

    #[error("duplicate row: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Rejected(LedgerError),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Contention { key } => LedgerError::Contention { key },
            StoreError::TenantIsolation(_) => LedgerError::CrossTenantAccess,
            StoreError::NotFound => LedgerError::NotFound,
            StoreError::Duplicate(msg) => LedgerError::malformed(format!("duplicate row: {msg}")),
            StoreError::Rejected(e) => e,
            StoreError::Corrupt(msg) => LedgerError::unavailable(format!("corrupt row: {msg}")),
            StoreError::Unavailable(msg) => LedgerError::unavailable(msg),
        }
    }
}

impl From<LedgerError> for StoreError {
    fn from(err: LedgerError) -> Self {
        StoreError::Rejected(err)
    }
}

/// Entitlement store, movement log and consumption log behind one boundary.
///
/// ## Write semantics
///
/// - `append_movement` takes the source key's serialization, recomputes the
///   source balance, rejects with `InsufficientBalance` when
///   `remaining < amount`, and inserts. All or nothing.
/// - `append_consumption` takes the consumption key's serialization and
///   rejects a second active row with the same `(tenant, external_ref)`.
/// - `retract_movement` takes the destination key's serialization (the
///   destination's balance is the one that decreases).
/// - No write ever holds more than one key.
///
/// ## Read semantics
///
/// Balances are always derived from the rows. Soft-deleted rows never
/// contribute. Lookups by id are global: tenant checks are the caller's job
/// (see `TenantGuard`), so a foreign id is *found* and then refused rather
/// than silently reported missing.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn entitlement(&self, key: &BalanceKey) -> Result<Option<Entitlement>, StoreError>;

    async fn insert_entitlement(&self, entitlement: Entitlement) -> Result<(), StoreError>;

    async fn correct_entitlement(
        &self,
        key: &BalanceKey,
        amount: i64,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Entitlement, StoreError>;

    async fn balance(&self, key: &BalanceKey) -> Result<Balance, StoreError>;

    /// Every (holder, category) with an entitlement or any active activity in
    /// the period, ordered by holder then category.
    async fn period_balances(&self, tenant_id: TenantId, period: Period) -> Result<Vec<Balance>, StoreError>;

    async fn append_movement(&self, movement: Movement) -> Result<(), StoreError>;

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError>;

    async fn retract_movement(
        &self,
        tenant_id: TenantId,
        id: MovementId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Retraction, StoreError>;

    /// Movements of a period, newest first.
    async fn movements(
        &self,
        tenant_id: TenantId,
        period: Period,
        include_deleted: bool,
    ) -> Result<Vec<Movement>, StoreError>;

    async fn append_consumption(&self, consumption: Consumption) -> Result<(), StoreError>;

    async fn consumption(&self, id: ConsumptionId) -> Result<Option<Consumption>, StoreError>;

    async fn retract_consumption(
        &self,
        tenant_id: TenantId,
        id: ConsumptionId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Retraction, StoreError>;

    /// Active consumptions of a period, newest first, optionally for one holder.
    async fn consumptions(
        &self,
        tenant_id: TenantId,
        period: Period,
        holder: Option<&HolderId>,
    ) -> Result<Vec<Consumption>, StoreError>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn entitlement(&self, key: &BalanceKey) -> Result<Option<Entitlement>, StoreError> {
        (**self).entitlement(key).await
    }

    async fn insert_entitlement(&self, entitlement: Entitlement) -> Result<(), StoreError> {
        (**self).insert_entitlement(entitlement).await
    }

    async fn correct_entitlement(
        &self,
        key: &BalanceKey,
        amount: i64,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Entitlement, StoreError> {
        (**self).correct_entitlement(key, amount, actor, at).await
    }

    async fn balance(&self, key: &BalanceKey) -> Result<Balance, StoreError> {
        (**self).balance(key).await
    }

    async fn period_balances(&self, tenant_id: TenantId, period: Period) -> Result<Vec<Balance>, StoreError> {
        (**self).period_balances(tenant_id, period).await
    }

    async fn append_movement(&self, movement: Movement) -> Result<(), StoreError> {
        (**self).append_movement(movement).await
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        (**self).movement(id).await
    }

    async fn retract_movement(
        &self,
        tenant_id: TenantId,
        id: MovementId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Retraction, StoreError> {
        (**self).retract_movement(tenant_id, id, actor, at).await
    }

    async fn movements(
        &self,
        tenant_id: TenantId,
        period: Period,
        include_deleted: bool,
    ) -> Result<Vec<Movement>, StoreError> {
        (**self).movements(tenant_id, period, include_deleted).await
    }

    async fn append_consumption(&self, consumption: Consumption) -> Result<(), StoreError> {
        (**self).append_consumption(consumption).await
    }

    async fn consumption(&self, id: ConsumptionId) -> Result<Option<Consumption>, StoreError> {
        (**self).consumption(id).await
    }

    async fn retract_consumption(
        &self,
        tenant_id: TenantId,
        id: ConsumptionId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Retraction, StoreError> {
        (**self).retract_consumption(tenant_id, id, actor, at).await
    }

    async fn consumptions(
        &self,
        tenant_id: TenantId,
        period: Period,
        holder: Option<&HolderId>,
    ) -> Result<Vec<Consumption>, StoreError> {
        (**self).consumptions(tenant_id, period, holder).await
    }
}
