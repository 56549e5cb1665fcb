use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use quotaledger_core::{CategoryCode, Entity, HolderId, MovementId, Period, TenantId, TenantScoped, UserId};

use crate::entitlement::BalanceKey;
use crate::error::{LedgerError, LedgerResult};
use crate::status::{Audit, RecordStatus, Retraction};
use crate::transfer::TransferRequest;
use crate::MAX_AMOUNT;

/// A recorded shift of entitlement from one holder to another.
///
/// Invariants (enforced by [`Movement::record`]): `source != destination`,
/// `0 < amount <= MAX_AMOUNT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub source: HolderId,
    pub destination: HolderId,
    pub category: CategoryCode,
    pub period: Period,
    pub amount: i64,
    pub effective_date: NaiveDate,
    pub note: Option<String>,
    pub audit: Audit,
    pub status: RecordStatus,
}

impl Movement {
    /// Build a new active movement row from a request that has already passed
    /// validation steps 1-4.
    pub fn record(
        tenant_id: TenantId,
        request: &TransferRequest,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        request.validate_shape()?;
        Ok(Self {
            id: MovementId::new(),
            tenant_id,
            source: request.source.clone(),
            destination: request.destination.clone(),
            category: request.category.clone(),
            period: request.period,
            amount: request.amount,
            effective_date: request.effective_date.unwrap_or_else(|| at.date_naive()),
            note: request.normalized_note(),
            audit: Audit::new(actor, at),
            status: RecordStatus::Active,
        })
    }

    pub fn source_key(&self) -> BalanceKey {
        BalanceKey::new(self.tenant_id, self.source.clone(), self.category.clone(), self.period)
    }

    pub fn destination_key(&self) -> BalanceKey {
        BalanceKey::new(
            self.tenant_id,
            self.destination.clone(),
            self.category.clone(),
            self.period,
        )
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn involves(&self, holder: &HolderId) -> bool {
        &self.source == holder || &self.destination == holder
    }

    pub fn retract(&mut self, by: UserId, at: DateTime<Utc>) -> Retraction {
        self.status.retract(by, at)
    }

    /// Re-check row invariants (used on rows read back from storage).
    pub fn check_invariants(&self) -> LedgerResult<()> {
        if self.source == self.destination {
            return Err(LedgerError::SameHolder {
                holder: self.source.to_string(),
            });
        }
        if self.amount <= 0 || self.amount > MAX_AMOUNT {
            return Err(LedgerError::InvalidAmount { amount: self.amount });
        }
        Ok(())
    }
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Movement {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: i64) -> TransferRequest {
        TransferRequest {
            source: HolderId::parse("H1").unwrap(),
            destination: HolderId::parse("H2").unwrap(),
            category: CategoryCode::parse("POP").unwrap(),
            period: Period::new(2026).unwrap(),
            amount,
            note: Some("  lease  ".to_string()),
            effective_date: None,
        }
    }

    #[test]
    fn record_defaults_effective_date_and_trims_note() {
        let at = Utc::now();
        let m = Movement::record(TenantId::new(), &request(2_000), UserId::new(), at).unwrap();
        assert_eq!(m.effective_date, at.date_naive());
        assert_eq!(m.note.as_deref(), Some("lease"));
        assert!(m.is_active());
        assert_eq!(m.source_key().holder.as_str(), "H1");
        assert_eq!(m.destination_key().holder.as_str(), "H2");
    }

    #[test]
    fn record_rejects_non_positive_amounts() {
        let err = Movement::record(TenantId::new(), &request(0), UserId::new(), Utc::now()).unwrap_err();
        assert_eq!(err, LedgerError::InvalidAmount { amount: 0 });
    }
}
