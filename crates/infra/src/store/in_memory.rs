use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};

use quotaledger_core::{ConsumptionId, HolderId, MovementId, Period, TenantId, UserId};
use quotaledger_ledger::transfer::check_sufficient;
use quotaledger_ledger::{
    Balance, BalanceCalculator, BalanceKey, Consumption, Entitlement, ExternalRef, LedgerError, Movement,
    Retraction,
};

use super::key_lock::KeyLocks;
use super::r#trait::{LedgerStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    entitlements: HashMap<BalanceKey, Entitlement>,
    movements: HashMap<MovementId, Movement>,
    consumptions: HashMap<ConsumptionId, Consumption>,
    /// Consumption per `(tenant, external_ref)`, retracted rows included.
    references: HashMap<(TenantId, ExternalRef), ConsumptionId>,
}

impl Tables {
    fn balance(&self, key: &BalanceKey) -> Balance {
        BalanceCalculator::balance(
            key,
            self.entitlements.get(key),
            self.movements.values(),
            self.consumptions.values(),
        )
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Row tables sit behind a std `RwLock` that is never
/// held across an await; per-key serialization comes from [`KeyLocks`].
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    tables: RwLock<Tables>,
    locks: KeyLocks,
}

impl InMemoryLedgerStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            locks: KeyLocks::new(lock_timeout),
        }
    }

    pub fn locks(&self) -> &KeyLocks {
        &self.locks
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

fn newest_first<T>(rows: &mut [T], at: impl Fn(&T) -> (DateTime<Utc>, uuid::Uuid)) {
    rows.sort_by(|a, b| at(b).cmp(&at(a)));
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn entitlement(&self, key: &BalanceKey) -> Result<Option<Entitlement>, StoreError> {
        Ok(self.read()?.entitlements.get(key).cloned())
    }

    async fn insert_entitlement(&self, entitlement: Entitlement) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.entitlements.contains_key(&entitlement.key) {
            return Err(StoreError::Rejected(LedgerError::DuplicateEntitlement {
                key: entitlement.key.to_string(),
            }));
        }
        tables.entitlements.insert(entitlement.key.clone(), entitlement);
        Ok(())
    }

    async fn correct_entitlement(
        &self,
        key: &BalanceKey,
        amount: i64,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Entitlement, StoreError> {
        let _held = self.locks.acquire(key).await?;
        let mut tables = self.write()?;
        let current = tables.entitlements.get(key).ok_or(StoreError::NotFound)?;
        let corrected = current.corrected(amount, actor, at)?;
        tables.entitlements.insert(key.clone(), corrected.clone());
        Ok(corrected)
    }

    async fn balance(&self, key: &BalanceKey) -> Result<Balance, StoreError> {
        Ok(self.read()?.balance(key))
    }

    async fn period_balances(&self, tenant_id: TenantId, period: Period) -> Result<Vec<Balance>, StoreError> {
        let tables = self.read()?;
        Ok(BalanceCalculator::period_balances(
            tenant_id,
            period,
            tables.entitlements.values(),
            tables.movements.values(),
            tables.consumptions.values(),
        ))
    }

    async fn append_movement(&self, movement: Movement) -> Result<(), StoreError> {
        movement.check_invariants()?;
        let source = movement.source_key();
        let _held = self.locks.acquire(&source).await?;

        let mut tables = self.write()?;
        if tables.movements.contains_key(&movement.id) {
            return Err(StoreError::Duplicate(format!("movement {}", movement.id)));
        }
        check_sufficient(&tables.balance(&source), movement.amount)?;
        tables.movements.insert(movement.id, movement);
        Ok(())
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        Ok(self.read()?.movements.get(&id).cloned())
    }

    async fn retract_movement(
        &self,
        tenant_id: TenantId,
        id: MovementId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Retraction, StoreError> {
        let destination = {
            let tables = self.read()?;
            let row = tables.movements.get(&id).ok_or(StoreError::NotFound)?;
            if row.tenant_id != tenant_id {
                return Err(StoreError::TenantIsolation(format!("movement {id}")));
            }
            row.destination_key()
        };

        let _held = self.locks.acquire(&destination).await?;
        let mut tables = self.write()?;
        let row = tables.movements.get_mut(&id).ok_or(StoreError::NotFound)?;
        Ok(row.retract(actor, at))
    }

    async fn movements(
        &self,
        tenant_id: TenantId,
        period: Period,
        include_deleted: bool,
    ) -> Result<Vec<Movement>, StoreError> {
        let tables = self.read()?;
        let mut rows: Vec<Movement> = tables
            .movements
            .values()
            .filter(|m| m.tenant_id == tenant_id && m.period == period)
            .filter(|m| include_deleted || m.is_active())
            .cloned()
            .collect();
        newest_first(&mut rows, |m| (m.audit.created_at, *m.id.as_uuid()));
        Ok(rows)
    }

    async fn append_consumption(&self, consumption: Consumption) -> Result<(), StoreError> {
        let key = consumption.key();
        let _held = self.locks.acquire(&key).await?;

        let mut tables = self.write()?;
        let reference = (consumption.tenant_id, consumption.external_ref.clone());
        if tables.references.contains_key(&reference) {
            return Err(StoreError::Rejected(LedgerError::DuplicateReference {
                external_ref: consumption.external_ref.to_string(),
            }));
        }
        tables.references.insert(reference, consumption.id);
        tables.consumptions.insert(consumption.id, consumption);
        Ok(())
    }

    async fn consumption(&self, id: ConsumptionId) -> Result<Option<Consumption>, StoreError> {
        Ok(self.read()?.consumptions.get(&id).cloned())
    }

    async fn retract_consumption(
        &self,
        tenant_id: TenantId,
        id: ConsumptionId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Retraction, StoreError> {
        let mut tables = self.write()?;
        let row = tables.consumptions.get_mut(&id).ok_or(StoreError::NotFound)?;
        if row.tenant_id != tenant_id {
            return Err(StoreError::TenantIsolation(format!("consumption {id}")));
        }
        // The reference stays claimed after retraction.
        Ok(row.retract(actor, at))
    }

    async fn consumptions(
        &self,
        tenant_id: TenantId,
        period: Period,
        holder: Option<&HolderId>,
    ) -> Result<Vec<Consumption>, StoreError> {
        let tables = self.read()?;
        let mut rows: Vec<Consumption> = tables
            .consumptions
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.period == period && c.is_active())
            .filter(|c| holder.is_none_or(|h| &c.holder == h))
            .cloned()
            .collect();
        newest_first(&mut rows, |c| (c.audit.created_at, *c.id.as_uuid()));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotaledger_core::CategoryCode;
    use proptest::prelude::*;
    use quotaledger_ledger::TransferRequest;

    fn h(code: &str) -> HolderId {
        HolderId::parse(code).unwrap()
    }

    fn cod() -> CategoryCode {
        CategoryCode::parse("COD").unwrap()
    }

    fn p() -> Period {
        Period::new(2024).unwrap()
    }

    fn movement(t: TenantId, from: &str, to: &str, amount: i64) -> Movement {
        let req = TransferRequest {
            source: h(from),
            destination: h(to),
            category: cod(),
            period: p(),
            amount,
            note: None,
            effective_date: None,
        };
        Movement::record(t, &req, UserId::new(), Utc::now()).unwrap()
    }

    async fn seeded(t: TenantId, holder: &str, amount: i64) -> InMemoryLedgerStore {
        let store = InMemoryLedgerStore::new(Duration::from_millis(200));
        let key = BalanceKey::new(t, h(holder), cod(), p());
        store
            .insert_entitlement(Entitlement::open(key, amount, UserId::new(), Utc::now()).unwrap())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn append_movement_rejects_overdraft_and_leaves_no_row() {
        let t = TenantId::new();
        let store = seeded(t, "H1", 1_000).await;

        let err = store.append_movement(movement(t, "H1", "H2", 1_001)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rejected(LedgerError::InsufficientBalance { available: 1_000, requested: 1_001 })
        ));
        assert!(store.movements(t, p(), true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retracting_a_movement_restores_both_sides() {
        let t = TenantId::new();
        let store = seeded(t, "H1", 1_000).await;
        let m = movement(t, "H1", "H2", 400);
        let id = m.id;
        store.append_movement(m).await.unwrap();

        let src = BalanceKey::new(t, h("H1"), cod(), p());
        let dst = BalanceKey::new(t, h("H2"), cod(), p());
        assert_eq!(store.balance(&src).await.unwrap().remaining, 600);
        assert_eq!(store.balance(&dst).await.unwrap().remaining, 400);

        let actor = UserId::new();
        assert_eq!(
            store.retract_movement(t, id, actor, Utc::now()).await.unwrap(),
            Retraction::Retracted
        );
        assert_eq!(
            store.retract_movement(t, id, actor, Utc::now()).await.unwrap(),
            Retraction::AlreadyRetracted
        );
        assert_eq!(store.balance(&src).await.unwrap().remaining, 1_000);
        assert_eq!(store.balance(&dst).await.unwrap().remaining, 0);
        assert_eq!(store.movements(t, p(), false).await.unwrap().len(), 0);
        assert_eq!(store.movements(t, p(), true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retract_refuses_foreign_tenant() {
        let t = TenantId::new();
        let store = seeded(t, "H1", 1_000).await;
        let m = movement(t, "H1", "H2", 10);
        let id = m.id;
        store.append_movement(m).await.unwrap();

        let err = store
            .retract_movement(TenantId::new(), id, UserId::new(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TenantIsolation(_)));
        assert!(store.movement(id).await.unwrap().unwrap().is_active());
    }

    #[tokio::test]
    async fn second_open_of_same_entitlement_is_rejected() {
        let t = TenantId::new();
        let store = seeded(t, "H1", 1_000).await;
        let key = BalanceKey::new(t, h("H1"), cod(), p());
        let err = store
            .insert_entitlement(Entitlement::open(key.clone(), 5, UserId::new(), Utc::now()).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(LedgerError::DuplicateEntitlement { .. })));

        let corrected = store
            .correct_entitlement(&key, 1_200, UserId::new(), Utc::now())
            .await
            .unwrap();
        assert_eq!(corrected.amount, 1_200);
        assert!(corrected.updated_by.is_some());
    }
    proptest! {
        #[test]
        fn random_transfer_sequences_conserve_and_never_overdraw(
            ops in proptest::collection::vec((0usize..3, 0usize..3, 1i64..3_000, any::<bool>()), 1..40)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
            rt.block_on(async {
                let t = TenantId::new();
                let holders = ["H1", "H2", "H3"];
                let store = InMemoryLedgerStore::new(Duration::from_millis(200));
                for (holder, amount) in [("H1", 5_000), ("H2", 3_000)] {
                    let key = BalanceKey::new(t, h(holder), cod(), p());
                    store
                        .insert_entitlement(Entitlement::open(key, amount, UserId::new(), Utc::now()).unwrap())
                        .await
                        .unwrap();
                }

                let mut accepted = Vec::new();
                for (from, to, amount, retract_last) in ops {
                    if retract_last {
                        if let Some(id) = accepted.pop() {
                            store.retract_movement(t, id, UserId::new(), Utc::now()).await.unwrap();
                        }
                        continue;
                    }
                    if from == to {
                        continue;
                    }
                    let m = movement(t, holders[from], holders[to], amount);
                    let id = m.id;
                    match store.append_movement(m).await {
                        Ok(()) => accepted.push(id),
                        Err(StoreError::Rejected(LedgerError::InsufficientBalance { .. })) => {}
                        Err(other) => panic!("unexpected: {other:?}"),
                    }
                }

                let balances = store.period_balances(t, p()).await.unwrap();
                let total: i64 = balances.iter().map(|b| b.remaining).sum();
                assert_eq!(total, 8_000);
                let net: i64 = balances.iter().map(|b| b.transfers_in - b.transfers_out).sum();
                assert_eq!(net, 0);
            });
        }
    }
}
