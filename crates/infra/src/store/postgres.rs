//! Postgres-backed ledger store.
//!
//! ## Per-key serialization
//!
//! Every write that can lower a balance runs in one transaction that first
//! takes `pg_advisory_xact_lock(hashtextextended(<key>, 0))` on the affected
//! `(tenant, holder, category, period)` key, with `lock_timeout` set locally
//! from the store configuration. The balance re-check and the insert/update
//! happen inside that transaction, and the lock is released at commit or
//! rollback. Unrelated keys hash to unrelated locks.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (lock not available) | `55P03` | `Contention` | advisory lock wait exceeded `lock_timeout` |
//! | Database (unique violation) | `23505` | `Rejected(Duplicate*)` / `Duplicate` | repeated external reference, second entitlement open |
//! | Database (check violation) | `23514` | `Rejected(Malformed)` | row invariant violated (amount, source = destination) |
//! | Database (other) | any other | `Unavailable` | |
//! | RowNotFound | N/A | `NotFound` | |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` | connectivity |

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{instrument, Span};

use quotaledger_core::{CategoryCode, ConsumptionId, HolderId, MovementId, Period, TenantId, UserId};
use quotaledger_ledger::transfer::check_sufficient;
use quotaledger_ledger::{
    Audit, Balance, BalanceKey, Consumption, Entitlement, ExternalRef, LedgerError, LedgerTotals, Movement,
    RecordStatus, Retraction,
};

use super::r#trait::{LedgerStore, StoreError};

/// Schema applied by [`PostgresLedgerStore::ensure_schema`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_quota_ledger.sql");

#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PostgresLedgerStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout,
        }
    }

    pub async fn connect(database_url: &str, lock_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, lock_timeout))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if missing (idempotent).
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    /// Take the advisory lock for `key` inside `tx`, bounded by `lock_timeout`.
    async fn lock_key(&self, tx: &mut Transaction<'static, Postgres>, key: &BalanceKey) -> Result<(), StoreError> {
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if has_sqlstate(&e, "55P03") {
                    tracing::warn!(key = %key, "advisory lock wait timed out");
                    StoreError::Contention { key: key.to_string() }
                } else {
                    map_sqlx_error("advisory_lock", e)
                }
            })?;
        Ok(())
    }
}

async fn read_balance<'e, E>(executor: E, key: &BalanceKey) -> Result<Balance, StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT amount FROM entitlements
              WHERE tenant_id = $1 AND holder = $2 AND category = $3 AND period = $4) AS entitlement,
            COALESCE((SELECT SUM(amount) FROM movements
              WHERE tenant_id = $1 AND destination = $2 AND category = $3 AND period = $4
                AND NOT is_deleted), 0)::BIGINT AS transfers_in,
            COALESCE((SELECT SUM(amount) FROM movements
              WHERE tenant_id = $1 AND source = $2 AND category = $3 AND period = $4
                AND NOT is_deleted), 0)::BIGINT AS transfers_out,
            COALESCE((SELECT SUM(amount) FROM consumptions
              WHERE tenant_id = $1 AND holder = $2 AND category = $3 AND period = $4
                AND NOT is_deleted), 0)::BIGINT AS consumed
        "#,
    )
    .bind(key.tenant_id.as_uuid())
    .bind(key.holder.as_str())
    .bind(key.category.as_str())
    .bind(key.period.year())
    .fetch_one(executor)
    .await
    .map_err(|e| map_sqlx_error("read_balance", e))?;

    let entitlement: Option<i64> = row.try_get("entitlement").map_err(corrupt)?;
    let totals = LedgerTotals {
        transfers_in: row.try_get("transfers_in").map_err(corrupt)?,
        transfers_out: row.try_get("transfers_out").map_err(corrupt)?,
        consumed: row.try_get("consumed").map_err(corrupt)?,
    };
    Ok(Balance::for_key(key, entitlement, totals))
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(key = %key), err)]
    async fn entitlement(&self, key: &BalanceKey) -> Result<Option<Entitlement>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, holder, category, period, amount,
                   created_by, created_at, updated_by, updated_at
            FROM entitlements
            WHERE tenant_id = $1 AND holder = $2 AND category = $3 AND period = $4
            "#,
        )
        .bind(key.tenant_id.as_uuid())
        .bind(key.holder.as_str())
        .bind(key.category.as_str())
        .bind(key.period.year())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_entitlement", e))?;

        row.map(|r| entitlement_from_row(&r)).transpose()
    }

    #[instrument(skip(self, entitlement), fields(key = %entitlement.key, amount = entitlement.amount), err)]
    async fn insert_entitlement(&self, entitlement: Entitlement) -> Result<(), StoreError> {
        let key = &entitlement.key;
        sqlx::query(
            r#"
            INSERT INTO entitlements (
                tenant_id, holder, category, period, amount, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(key.tenant_id.as_uuid())
        .bind(key.holder.as_str())
        .bind(key.category.as_str())
        .bind(key.period.year())
        .bind(entitlement.amount)
        .bind(entitlement.created_by.as_uuid())
        .bind(entitlement.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if has_sqlstate(&e, "23505") {
                StoreError::Rejected(LedgerError::DuplicateEntitlement { key: key.to_string() })
            } else {
                map_sqlx_error("insert_entitlement", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn correct_entitlement(
        &self,
        key: &BalanceKey,
        amount: i64,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Entitlement, StoreError> {
        let mut tx = self.begin().await?;
        self.lock_key(&mut tx, key).await?;

        let row = sqlx::query(
            r#"
            SELECT tenant_id, holder, category, period, amount,
                   created_by, created_at, updated_by, updated_at
            FROM entitlements
            WHERE tenant_id = $1 AND holder = $2 AND category = $3 AND period = $4
            FOR UPDATE
            "#,
        )
        .bind(key.tenant_id.as_uuid())
        .bind(key.holder.as_str())
        .bind(key.category.as_str())
        .bind(key.period.year())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_entitlement", e))?
        .ok_or(StoreError::NotFound)?;

        let corrected = entitlement_from_row(&row)?.corrected(amount, actor, at)?;

        sqlx::query(
            r#"
            UPDATE entitlements
            SET amount = $5, updated_by = $6, updated_at = $7
            WHERE tenant_id = $1 AND holder = $2 AND category = $3 AND period = $4
            "#,
        )
        .bind(key.tenant_id.as_uuid())
        .bind(key.holder.as_str())
        .bind(key.category.as_str())
        .bind(key.period.year())
        .bind(corrected.amount)
        .bind(actor.as_uuid())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_entitlement", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(corrected)
    }

    async fn balance(&self, key: &BalanceKey) -> Result<Balance, StoreError> {
        read_balance(&*self.pool, key).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id.as_uuid(), period = %period, rows = tracing::field::Empty), err)]
    async fn period_balances(&self, tenant_id: TenantId, period: Period) -> Result<Vec<Balance>, StoreError> {
        let rows = sqlx::query(
            r#"
            WITH ent AS (
                SELECT holder, category, amount
                FROM entitlements WHERE tenant_id = $1 AND period = $2
            ),
            ins AS (
                SELECT destination AS holder, category, SUM(amount) AS total
                FROM movements WHERE tenant_id = $1 AND period = $2 AND NOT is_deleted
                GROUP BY destination, category
            ),
            outs AS (
                SELECT source AS holder, category, SUM(amount) AS total
                FROM movements WHERE tenant_id = $1 AND period = $2 AND NOT is_deleted
                GROUP BY source, category
            ),
            used AS (
                SELECT holder, category, SUM(amount) AS total
                FROM consumptions WHERE tenant_id = $1 AND period = $2 AND NOT is_deleted
                GROUP BY holder, category
            ),
            keys AS (
                SELECT holder, category FROM ent
                UNION SELECT holder, category FROM ins
                UNION SELECT holder, category FROM outs
                UNION SELECT holder, category FROM used
            )
            SELECT
                k.holder,
                k.category,
                e.amount AS entitlement,
                COALESCE(i.total, 0)::BIGINT AS transfers_in,
                COALESCE(o.total, 0)::BIGINT AS transfers_out,
                COALESCE(u.total, 0)::BIGINT AS consumed
            FROM keys k
            LEFT JOIN ent e USING (holder, category)
            LEFT JOIN ins i USING (holder, category)
            LEFT JOIN outs o USING (holder, category)
            LEFT JOIN used u USING (holder, category)
            ORDER BY k.holder ASC, k.category ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(period.year())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("period_balances", e))?;

        let mut balances = Vec::with_capacity(rows.len());
        for row in rows {
            let holder: String = row.try_get("holder").map_err(corrupt)?;
            let category: String = row.try_get("category").map_err(corrupt)?;
            let totals = LedgerTotals {
                transfers_in: row.try_get("transfers_in").map_err(corrupt)?,
                transfers_out: row.try_get("transfers_out").map_err(corrupt)?,
                consumed: row.try_get("consumed").map_err(corrupt)?,
            };
            balances.push(Balance::from_parts(
                parse_holder(&holder)?,
                parse_category(&category)?,
                period,
                row.try_get("entitlement").map_err(corrupt)?,
                totals,
            ));
        }

        Span::current().record("rows", balances.len());
        Ok(balances)
    }

    #[instrument(
        skip(self, movement),
        fields(
            tenant_id = %movement.tenant_id.as_uuid(),
            source = %movement.source,
            destination = %movement.destination,
            category = %movement.category,
            period = %movement.period,
            amount = movement.amount
        ),
        err
    )]
    async fn append_movement(&self, movement: Movement) -> Result<(), StoreError> {
        movement.check_invariants()?;
        let source = movement.source_key();

        let mut tx = self.begin().await?;
        self.lock_key(&mut tx, &source).await?;

        let balance = read_balance(&mut *tx, &source).await?;
        if let Err(rejection) = check_sufficient(&balance, movement.amount) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Rejected(rejection));
        }

        sqlx::query(
            r#"
            INSERT INTO movements (
                id, tenant_id, source, destination, category, period, amount,
                effective_date, note, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.tenant_id.as_uuid())
        .bind(movement.source.as_str())
        .bind(movement.destination.as_str())
        .bind(movement.category.as_str())
        .bind(movement.period.year())
        .bind(movement.amount)
        .bind(movement.effective_date)
        .bind(movement.note.as_deref())
        .bind(movement.audit.created_by.as_uuid())
        .bind(movement.audit.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        let row = sqlx::query(&format!("{MOVEMENT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_movement", e))?;

        row.map(|r| MovementRow::from_row(&r).and_then(Movement::try_from))
            .transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id.as_uuid(), movement_id = %id), err)]
    async fn retract_movement(
        &self,
        tenant_id: TenantId,
        id: MovementId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Retraction, StoreError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query("SELECT tenant_id, destination, category, period FROM movements WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_movement", e))?
            .ok_or(StoreError::NotFound)?;

        let owner: uuid::Uuid = row.try_get("tenant_id").map_err(corrupt)?;
        if owner != *tenant_id.as_uuid() {
            return Err(StoreError::TenantIsolation(format!("movement {id}")));
        }
        let destination = BalanceKey::new(
            tenant_id,
            parse_holder(&row.try_get::<String, _>("destination").map_err(corrupt)?)?,
            parse_category(&row.try_get::<String, _>("category").map_err(corrupt)?)?,
            parse_period(row.try_get("period").map_err(corrupt)?)?,
        );
        self.lock_key(&mut tx, &destination).await?;

        let updated = sqlx::query(
            r#"
            UPDATE movements
            SET is_deleted = TRUE, deleted_by = $3, deleted_at = $4
            WHERE tenant_id = $1 AND id = $2 AND NOT is_deleted
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(actor.as_uuid())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("retract_movement", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(if updated.rows_affected() == 1 {
            Retraction::Retracted
        } else {
            Retraction::AlreadyRetracted
        })
    }

    async fn movements(
        &self,
        tenant_id: TenantId,
        period: Period,
        include_deleted: bool,
    ) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(&format!(
            "{MOVEMENT_COLUMNS} WHERE tenant_id = $1 AND period = $2 AND ($3 OR NOT is_deleted) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(tenant_id.as_uuid())
        .bind(period.year())
        .bind(include_deleted)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter()
            .map(|r| MovementRow::from_row(r).and_then(Movement::try_from))
            .collect()
    }

    #[instrument(
        skip(self, consumption),
        fields(
            tenant_id = %consumption.tenant_id.as_uuid(),
            holder = %consumption.holder,
            category = %consumption.category,
            period = %consumption.period,
            external_ref = %consumption.external_ref
        ),
        err
    )]
    async fn append_consumption(&self, consumption: Consumption) -> Result<(), StoreError> {
        let key = consumption.key();
        let mut tx = self.begin().await?;
        self.lock_key(&mut tx, &key).await?;

        sqlx::query(
            r#"
            INSERT INTO consumptions (
                id, tenant_id, holder, category, period, amount,
                event_date, external_ref, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(consumption.id.as_uuid())
        .bind(consumption.tenant_id.as_uuid())
        .bind(consumption.holder.as_str())
        .bind(consumption.category.as_str())
        .bind(consumption.period.year())
        .bind(consumption.amount)
        .bind(consumption.event_date)
        .bind(consumption.external_ref.as_str())
        .bind(consumption.audit.created_by.as_uuid())
        .bind(consumption.audit.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if has_sqlstate(&e, "23505") {
                StoreError::Rejected(LedgerError::DuplicateReference {
                    external_ref: consumption.external_ref.to_string(),
                })
            } else {
                map_sqlx_error("insert_consumption", e)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn consumption(&self, id: ConsumptionId) -> Result<Option<Consumption>, StoreError> {
        let row = sqlx::query(&format!("{CONSUMPTION_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_consumption", e))?;

        row.map(|r| ConsumptionRow::from_row(&r).and_then(Consumption::try_from))
            .transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id.as_uuid(), consumption_id = %id), err)]
    async fn retract_consumption(
        &self,
        tenant_id: TenantId,
        id: ConsumptionId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Retraction, StoreError> {
        let owner: Option<uuid::Uuid> = sqlx::query_scalar("SELECT tenant_id FROM consumptions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_consumption", e))?;

        match owner {
            None => return Err(StoreError::NotFound),
            Some(owner) if owner != *tenant_id.as_uuid() => {
                return Err(StoreError::TenantIsolation(format!("consumption {id}")));
            }
            Some(_) => {}
        }

        let updated = sqlx::query(
            r#"
            UPDATE consumptions
            SET is_deleted = TRUE, deleted_by = $3, deleted_at = $4
            WHERE tenant_id = $1 AND id = $2 AND NOT is_deleted
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(actor.as_uuid())
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("retract_consumption", e))?;

        Ok(if updated.rows_affected() == 1 {
            Retraction::Retracted
        } else {
            Retraction::AlreadyRetracted
        })
    }

    async fn consumptions(
        &self,
        tenant_id: TenantId,
        period: Period,
        holder: Option<&HolderId>,
    ) -> Result<Vec<Consumption>, StoreError> {
        let rows = sqlx::query(&format!(
            "{CONSUMPTION_COLUMNS} WHERE tenant_id = $1 AND period = $2 AND NOT is_deleted \
             AND ($3::TEXT IS NULL OR holder = $3) ORDER BY created_at DESC, id DESC"
        ))
        .bind(tenant_id.as_uuid())
        .bind(period.year())
        .bind(holder.map(HolderId::as_str))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_consumptions", e))?;

        rows.iter()
            .map(|r| ConsumptionRow::from_row(r).and_then(Consumption::try_from))
            .collect()
    }
}

/// Check if an error carries the given SQLSTATE code.
fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(actual) = db_err.code() {
            return actual.as_ref() == code;
        }
    }
    false
}

/// Map SQLx errors to `StoreError` with operation context.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                Some("23514") => StoreError::Rejected(LedgerError::malformed(msg)),
                Some("55P03") => StoreError::Contention {
                    key: operation.to_string(),
                },
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => StoreError::Unavailable(format!("connection pool closed in {}", operation)),
        sqlx::Error::PoolTimedOut => StoreError::Unavailable(format!("connection pool timed out in {}", operation)),
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn corrupt(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn parse_holder(raw: &str) -> Result<HolderId, StoreError> {
    HolderId::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn parse_category(raw: &str) -> Result<CategoryCode, StoreError> {
    CategoryCode::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn parse_period(raw: i32) -> Result<Period, StoreError> {
    Period::new(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn status_from_columns(
    is_deleted: bool,
    deleted_by: Option<uuid::Uuid>,
    deleted_at: Option<DateTime<Utc>>,
) -> Result<RecordStatus, StoreError> {
    match (is_deleted, deleted_by, deleted_at) {
        (false, _, _) => Ok(RecordStatus::Active),
        (true, Some(by), Some(at)) => Ok(RecordStatus::Deleted {
            deleted_by: UserId::from_uuid(by),
            deleted_at: at,
        }),
        (true, _, _) => Err(StoreError::Corrupt("deleted row without actor/timestamp".to_string())),
    }
}

fn entitlement_from_row(row: &PgRow) -> Result<Entitlement, StoreError> {
    let tenant_id: uuid::Uuid = row.try_get("tenant_id").map_err(corrupt)?;
    let holder: String = row.try_get("holder").map_err(corrupt)?;
    let category: String = row.try_get("category").map_err(corrupt)?;
    let updated_by: Option<uuid::Uuid> = row.try_get("updated_by").map_err(corrupt)?;
    let created_by: uuid::Uuid = row.try_get("created_by").map_err(corrupt)?;

    Ok(Entitlement {
        key: BalanceKey::new(
            TenantId::from_uuid(tenant_id),
            parse_holder(&holder)?,
            parse_category(&category)?,
            parse_period(row.try_get("period").map_err(corrupt)?)?,
        ),
        amount: row.try_get("amount").map_err(corrupt)?,
        created_by: UserId::from_uuid(created_by),
        created_at: row.try_get("created_at").map_err(corrupt)?,
        updated_by: updated_by.map(UserId::from_uuid),
        updated_at: row.try_get("updated_at").map_err(corrupt)?,
    })
}

// SQLx row types

const MOVEMENT_COLUMNS: &str = "SELECT id, tenant_id, source, destination, category, period, amount, \
     effective_date, note, created_by, created_at, is_deleted, deleted_by, deleted_at FROM movements";

const CONSUMPTION_COLUMNS: &str = "SELECT id, tenant_id, holder, category, period, amount, event_date, \
     external_ref, created_by, created_at, is_deleted, deleted_by, deleted_at FROM consumptions";

#[derive(Debug)]
struct MovementRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    source: String,
    destination: String,
    category: String,
    period: i32,
    amount: i64,
    effective_date: NaiveDate,
    note: Option<String>,
    created_by: uuid::Uuid,
    created_at: DateTime<Utc>,
    is_deleted: bool,
    deleted_by: Option<uuid::Uuid>,
    deleted_at: Option<DateTime<Utc>>,
}

impl MovementRow {
    fn from_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(MovementRow {
            id: row.try_get("id").map_err(corrupt)?,
            tenant_id: row.try_get("tenant_id").map_err(corrupt)?,
            source: row.try_get("source").map_err(corrupt)?,
            destination: row.try_get("destination").map_err(corrupt)?,
            category: row.try_get("category").map_err(corrupt)?,
            period: row.try_get("period").map_err(corrupt)?,
            amount: row.try_get("amount").map_err(corrupt)?,
            effective_date: row.try_get("effective_date").map_err(corrupt)?,
            note: row.try_get("note").map_err(corrupt)?,
            created_by: row.try_get("created_by").map_err(corrupt)?,
            created_at: row.try_get("created_at").map_err(corrupt)?,
            is_deleted: row.try_get("is_deleted").map_err(corrupt)?,
            deleted_by: row.try_get("deleted_by").map_err(corrupt)?,
            deleted_at: row.try_get("deleted_at").map_err(corrupt)?,
        })
    }
}

impl TryFrom<MovementRow> for Movement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement = Movement {
            id: MovementId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            source: parse_holder(&row.source)?,
            destination: parse_holder(&row.destination)?,
            category: parse_category(&row.category)?,
            period: parse_period(row.period)?,
            amount: row.amount,
            effective_date: row.effective_date,
            note: row.note,
            audit: Audit::new(UserId::from_uuid(row.created_by), row.created_at),
            status: status_from_columns(row.is_deleted, row.deleted_by, row.deleted_at)?,
        };
        movement
            .check_invariants()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(movement)
    }
}

#[derive(Debug)]
struct ConsumptionRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    holder: String,
    category: String,
    period: i32,
    amount: i64,
    event_date: NaiveDate,
    external_ref: String,
    created_by: uuid::Uuid,
    created_at: DateTime<Utc>,
    is_deleted: bool,
    deleted_by: Option<uuid::Uuid>,
    deleted_at: Option<DateTime<Utc>>,
}

impl ConsumptionRow {
    fn from_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(ConsumptionRow {
            id: row.try_get("id").map_err(corrupt)?,
            tenant_id: row.try_get("tenant_id").map_err(corrupt)?,
            holder: row.try_get("holder").map_err(corrupt)?,
            category: row.try_get("category").map_err(corrupt)?,
            period: row.try_get("period").map_err(corrupt)?,
            amount: row.try_get("amount").map_err(corrupt)?,
            event_date: row.try_get("event_date").map_err(corrupt)?,
            external_ref: row.try_get("external_ref").map_err(corrupt)?,
            created_by: row.try_get("created_by").map_err(corrupt)?,
            created_at: row.try_get("created_at").map_err(corrupt)?,
            is_deleted: row.try_get("is_deleted").map_err(corrupt)?,
            deleted_by: row.try_get("deleted_by").map_err(corrupt)?,
            deleted_at: row.try_get("deleted_at").map_err(corrupt)?,
        })
    }
}

impl TryFrom<ConsumptionRow> for Consumption {
    type Error = StoreError;

    fn try_from(row: ConsumptionRow) -> Result<Self, Self::Error> {
        Ok(Consumption {
            id: ConsumptionId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            holder: parse_holder(&row.holder)?,
            category: parse_category(&row.category)?,
            period: parse_period(row.period)?,
            amount: row.amount,
            event_date: row.event_date,
            external_ref: ExternalRef::parse(&row.external_ref).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            audit: Audit::new(UserId::from_uuid(row.created_by), row.created_at),
            status: status_from_columns(row.is_deleted, row.deleted_by, row.deleted_at)?,
        })
    }
}
