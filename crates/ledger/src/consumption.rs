use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use quotaledger_core::{CategoryCode, ConsumptionId, Entity, HolderId, Period, TenantId, TenantScoped, UserId};

use crate::entitlement::BalanceKey;
use crate::error::{LedgerError, LedgerResult};
use crate::status::{Audit, RecordStatus, Retraction};
use crate::MAX_AMOUNT;

/// Caller-supplied reference of a harvest report (e.g. a landing ticket number).
///
/// Unique per tenant: the deduplication key for consumption.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalRef(String);

impl ExternalRef {
    pub const MAX_LEN: usize = 128;

    pub fn parse(value: impl AsRef<str>) -> LedgerResult<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(LedgerError::malformed("external reference is empty"));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(LedgerError::malformed(format!(
                "external reference longer than {} bytes",
                Self::MAX_LEN
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ExternalRef {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ExternalRef> for String {
    fn from(value: ExternalRef) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRequest {
    pub holder: HolderId,
    pub category: CategoryCode,
    pub amount: i64,
    pub event_date: NaiveDate,
    pub external_ref: ExternalRef,
}

impl ConsumptionRequest {
    pub fn validate_shape(&self) -> LedgerResult<Period> {
        if self.amount <= 0 || self.amount > MAX_AMOUNT {
            return Err(LedgerError::InvalidAmount { amount: self.amount });
        }
        Ok(Period::containing(self.event_date)?)
    }
}

/// Recorded real-world harvest against a holder.
///
/// Never blocked by balance: consumption may push remaining below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumption {
    pub id: ConsumptionId,
    pub tenant_id: TenantId,
    pub holder: HolderId,
    pub category: CategoryCode,
    pub period: Period,
    pub amount: i64,
    pub event_date: NaiveDate,
    pub external_ref: ExternalRef,
    pub audit: Audit,
    pub status: RecordStatus,
}

impl Consumption {
    pub fn record(
        tenant_id: TenantId,
        request: &ConsumptionRequest,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        let period = request.validate_shape()?;
        Ok(Self {
            id: ConsumptionId::new(),
            tenant_id,
            holder: request.holder.clone(),
            category: request.category.clone(),
            period,
            amount: request.amount,
            event_date: request.event_date,
            external_ref: request.external_ref.clone(),
            audit: Audit::new(actor, at),
            status: RecordStatus::Active,
        })
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.tenant_id, self.holder.clone(), self.category.clone(), self.period)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn retract(&mut self, by: UserId, at: DateTime<Utc>) -> Retraction {
        self.status.retract(by, at)
    }
}

impl Entity for Consumption {
    type Id = ConsumptionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Consumption {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_follows_event_date_year() {
        let req = ConsumptionRequest {
            holder: HolderId::parse("H1").unwrap(),
            category: CategoryCode::parse("POP").unwrap(),
            amount: 3_000,
            event_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            external_ref: ExternalRef::parse("R-100").unwrap(),
        };
        let c = Consumption::record(TenantId::new(), &req, UserId::new(), Utc::now()).unwrap();
        assert_eq!(c.period.year(), 2025);
        assert_eq!(c.key().period.year(), 2025);
    }

    #[test]
    fn external_ref_must_be_present() {
        assert!(ExternalRef::parse("  ").is_err());
        assert_eq!(ExternalRef::parse(" R-100 ").unwrap().as_str(), "R-100");
    }

    #[test]
    fn zero_consumption_is_rejected() {
        let req = ConsumptionRequest {
            holder: HolderId::parse("H1").unwrap(),
            category: CategoryCode::parse("POP").unwrap(),
            amount: 0,
            event_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            external_ref: ExternalRef::parse("R-1").unwrap(),
        };
        assert_eq!(req.validate_shape().unwrap_err(), LedgerError::InvalidAmount { amount: 0 });
    }
}
