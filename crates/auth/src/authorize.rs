use thiserror::Error;

use quotaledger_core::{HolderId, TenantId};

use crate::{Actor, Permission};

/// Something an actor may attempt against the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ReadBalances,
    ReadActivity,
    ProposeTransfer,
    RetractTransfer,
    RecordConsumption,
    RetractConsumption,
    ManageEntitlements,
}

impl Action {
    pub fn required_permission(self) -> Permission {
        match self {
            Action::ReadBalances => Permission::BALANCES_READ,
            Action::ReadActivity => Permission::ACTIVITY_READ,
            Action::ProposeTransfer => Permission::TRANSFERS_PROPOSE,
            Action::RetractTransfer => Permission::TRANSFERS_RETRACT,
            Action::RecordConsumption => Permission::CONSUMPTION_RECORD,
            Action::RetractConsumption => Permission::CONSUMPTION_RETRACT,
            Action::ManageEntitlements => Permission::ENTITLEMENTS_MANAGE,
        }
    }

    fn is_read(self) -> bool {
        matches!(self, Action::ReadBalances | Action::ReadActivity)
    }
}

/// What the action targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Tenant-wide data (all holders).
    Tenant(TenantId),
    /// A single holder's data.
    Holder(TenantId, HolderId),
}

impl Resource {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            Resource::Tenant(t) | Resource::Holder(t, _) => *t,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: outside holder scope")]
    OutsideHolderScope,
}

/// The single capability check every ledger operation goes through.
///
/// - No IO
/// - No panics
/// - Holder-scoped actors only ever read their own holder
pub fn can(actor: &Actor, action: Action, resource: &Resource) -> Result<(), AuthzError> {
    if actor.tenant_id != resource.tenant_id() {
        return Err(AuthzError::TenantMismatch);
    }

    let required = action.required_permission();
    if !actor.has_permission(&required) {
        return Err(AuthzError::Forbidden(required.as_str().to_string()));
    }

    if let Some(scope) = &actor.holder_scope {
        match resource {
            Resource::Holder(_, holder) if holder == scope && action.is_read() => {}
            _ => return Err(AuthzError::OutsideHolderScope),
        }
    }

    Ok(())
}
