//! Write path for movements.
//!
//! Steps 1-4 (same holder, amount, transferable category, known active
//! holders) are checked here against reference data. Step 5 (sufficiency)
//! runs inside the store's atomic append under the source key's
//! serialization, so it is always evaluated against a balance no concurrent
//! proposal can change before the insert.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use quotaledger_core::{MovementId, TenantId, UserId};
use quotaledger_ledger::transfer::{check_category, check_holder};
use quotaledger_ledger::{LedgerResult, Movement, Retraction, TransferRequest};

use crate::guard::TenantGuard;
use crate::reference::ReferenceDirectory;
use crate::retry::RetryPolicy;
use crate::store::LedgerStore;

pub struct TransferExecutor<S, R> {
    guard: Arc<TenantGuard<S, R>>,
    retry: RetryPolicy,
}

impl<S, R> TransferExecutor<S, R>
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
            source = %request.source,
            destination = %request.destination,
            category = %request.category,
            period = %request.period,
            amount = request.amount
        ),
        err
    )]
    pub async fn propose(&self, tenant: TenantId, request: &TransferRequest, actor: UserId) -> LedgerResult<MovementId> {
        let id = self
            .retry
            .run("propose_transfer", || self.attempt(tenant, request, actor))
            .await?;
        tracing::info!(movement_id = %id, "transfer recorded");
        Ok(id)
    }

    async fn attempt(&self, tenant: TenantId, request: &TransferRequest, actor: UserId) -> LedgerResult<MovementId> {
        // 1-2
        request.validate_shape()?;

        // 3
        let category = self.guard.category(tenant, &request.category).await?;
        check_category(tenant, &request.category, category.as_ref())?;

        // 4
        let source = self.guard.holder(tenant, &request.source).await?;
        check_holder(tenant, &request.source, source.as_ref())?;
        let destination = self.guard.holder(tenant, &request.destination).await?;
        check_holder(tenant, &request.destination, destination.as_ref())?;

        // 5 + insert, atomically
        let movement = Movement::record(tenant, request, actor, Utc::now())?;
        let id = movement.id;
        self.guard.append_movement(tenant, movement).await?;
        Ok(id)
    }

    /// Soft-delete a movement. Idempotent; never resurrects.
    #[instrument(skip(self), fields(tenant_id = %tenant, movement_id = %id), err)]
    pub async fn retract(&self, tenant: TenantId, id: MovementId, actor: UserId) -> LedgerResult<Retraction> {
        let outcome = self
            .retry
            .run("retract_transfer", || self.guard.retract_movement(tenant, id, actor, Utc::now()))
            .await?;
        tracing::info!(?outcome, "transfer retraction");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::reference::InMemoryReferenceDirectory;
    use crate::store::InMemoryLedgerStore;
    use quotaledger_core::{CategoryCode, HolderId, Period};
    use quotaledger_ledger::{BalanceKey, Category, Entitlement, Holder, LedgerError, UnitOfMeasure};

    fn h(code: &str) -> HolderId {
        HolderId::parse(code).unwrap()
    }

    fn code(c: &str) -> CategoryCode {
        CategoryCode::parse(c).unwrap()
    }

    fn p() -> Period {
        Period::new(2024).unwrap()
    }

    async fn setup(t: TenantId) -> TransferExecutor<InMemoryLedgerStore, InMemoryReferenceDirectory> {
        let dir = InMemoryReferenceDirectory::new();
        for (id, active) in [("H1", true), ("H2", true), ("H9", false)] {
            dir.upsert_holder(Holder {
                tenant_id: t,
                id: h(id),
                name: None,
                group: None,
                active,
            });
        }
        dir.upsert_category(Category {
            tenant_id: None,
            code: code("COD"),
            name: None,
            transferable: true,
            unit: UnitOfMeasure::Mass,
        });
        dir.upsert_category(Category {
            tenant_id: Some(t),
            code: code("HAL"),
            name: None,
            transferable: false,
            unit: UnitOfMeasure::Count,
        });

        let guard = Arc::new(TenantGuard::new(InMemoryLedgerStore::new(Duration::from_millis(200)), dir));
        guard
            .open_entitlement(
                t,
                Entitlement::open(BalanceKey::new(t, h("H1"), code("COD"), p()), 1_000, UserId::new(), Utc::now())
                    .unwrap(),
            )
            .await
            .unwrap();
        TransferExecutor::new(guard, RetryPolicy::no_retry())
    }

    fn req(from: &str, to: &str, category: &str, amount: i64) -> TransferRequest {
        TransferRequest {
            source: h(from),
            destination: h(to),
            category: code(category),
            period: p(),
            amount,
            note: Some("  ".into()),
            effective_date: None,
        }
    }

    #[tokio::test]
    async fn validation_order_is_reported_step_by_step() {
        let t = TenantId::new();
        let ex = setup(t).await;
        let actor = UserId::new();

        // Same holder wins over a bad amount.
        assert!(matches!(
            ex.propose(t, &req("H1", "H1", "COD", 0), actor).await,
            Err(LedgerError::SameHolder { .. })
        ));
        // Bad amount wins over a non-transferable category.
        assert!(matches!(
            ex.propose(t, &req("H1", "H2", "HAL", -5), actor).await,
            Err(LedgerError::InvalidAmount { amount: -5 })
        ));
        // Non-transferable category wins over an unknown holder.
        assert!(matches!(
            ex.propose(t, &req("H1", "NOPE", "HAL", 5), actor).await,
            Err(LedgerError::NonTransferableCategory { .. })
        ));
        assert!(matches!(
            ex.propose(t, &req("H1", "H2", "XXX", 5), actor).await,
            Err(LedgerError::UnknownCategory { .. })
        ));
        assert!(matches!(
            ex.propose(t, &req("H1", "NOPE", "COD", 5), actor).await,
            Err(LedgerError::UnknownHolder { .. })
        ));
        // Inactive destination.
        assert!(matches!(
            ex.propose(t, &req("H1", "H9", "COD", 5), actor).await,
            Err(LedgerError::UnknownHolder { .. })
        ));
        assert_eq!(
            ex.propose(t, &req("H1", "H2", "COD", 1_001), actor).await,
            Err(LedgerError::InsufficientBalance {
                available: 1_000,
                requested: 1_001
            })
        );
    }

    #[tokio::test]
    async fn holders_of_another_tenant_are_unknown() {
        let t = TenantId::new();
        let ex = setup(t).await;
        let other = TenantId::new();
        assert!(matches!(
            ex.propose(other, &req("H1", "H2", "COD", 5), UserId::new()).await,
            Err(LedgerError::UnknownHolder { .. })
        ));
    }

    #[tokio::test]
    async fn success_stores_normalized_note_and_is_observable() {
        let t = TenantId::new();
        let ex = setup(t).await;
        let id = ex.propose(t, &req("H1", "H2", "COD", 250), UserId::new()).await.unwrap();

        let stored = ex.guard.movement(t, id).await.unwrap();
        assert_eq!(stored.note, None);

        let src = ex.guard.balance(t, &stored.source_key()).await.unwrap();
        let dst = ex.guard.balance(t, &stored.destination_key()).await.unwrap();
        assert_eq!((src.remaining, dst.remaining), (750, 250));
    }
}
