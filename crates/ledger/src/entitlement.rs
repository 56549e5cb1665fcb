use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quotaledger_core::{CategoryCode, HolderId, Period, TenantId, TenantScoped, UserId};

use crate::error::{LedgerError, LedgerResult};
use crate::MAX_AMOUNT;

/// The unit of balance accounting and of write serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    pub tenant_id: TenantId,
    pub holder: HolderId,
    pub category: CategoryCode,
    pub period: Period,
}

impl BalanceKey {
    pub fn new(tenant_id: TenantId, holder: HolderId, category: CategoryCode, period: Period) -> Self {
        Self {
            tenant_id,
            holder,
            category,
            period,
        }
    }
}

impl core::fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}/{}/{}", self.tenant_id, self.holder, self.category, self.period)
    }
}

impl TenantScoped for BalanceKey {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Starting allocation for one (tenant, holder, category, period).
///
/// Opened once per period; later changes are administrative corrections,
/// never movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub key: BalanceKey,
    pub amount: i64,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entitlement {
    pub fn open(key: BalanceKey, amount: i64, actor: UserId, at: DateTime<Utc>) -> LedgerResult<Self> {
        validate_entitlement_amount(amount)?;
        Ok(Self {
            key,
            amount,
            created_by: actor,
            created_at: at,
            updated_by: None,
            updated_at: None,
        })
    }

    /// Administrative edit: returns the corrected row, leaving creation audit intact.
    pub fn corrected(&self, amount: i64, actor: UserId, at: DateTime<Utc>) -> LedgerResult<Self> {
        validate_entitlement_amount(amount)?;
        Ok(Self {
            amount,
            updated_by: Some(actor),
            updated_at: Some(at),
            ..self.clone()
        })
    }
}

impl TenantScoped for Entitlement {
    fn tenant_id(&self) -> TenantId {
        self.key.tenant_id
    }
}

fn validate_entitlement_amount(amount: i64) -> LedgerResult<()> {
    // Zero is a legitimate allocation; negative never is.
    if !(0..=MAX_AMOUNT).contains(&amount) {
        return Err(LedgerError::InvalidAmount { amount });
    }
    Ok(())
}
