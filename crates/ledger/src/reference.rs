//! Reference data consumed (never written) by the ledger.

use serde::{Deserialize, Serialize};

use quotaledger_core::{CategoryCode, Entity, GroupId, HolderId, TenantId, TenantScoped};

/// An entity authorized to receive harvest entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub tenant_id: TenantId,
    pub id: HolderId,
    pub name: Option<String>,
    pub group: Option<GroupId>,
    pub active: bool,
}

impl Entity for Holder {
    type Id = HolderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Holder {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    Mass,
    Count,
}

/// Commodity classification.
///
/// `tenant_id == None` marks a shared-reference category: readable by every
/// tenant, never itself a ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub tenant_id: Option<TenantId>,
    pub code: CategoryCode,
    pub name: Option<String>,
    pub transferable: bool,
    pub unit: UnitOfMeasure,
}

impl Category {
    pub fn is_shared_reference(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Visible to `tenant` either as its own row or as shared reference data.
    pub fn visible_to(&self, tenant: TenantId) -> bool {
        match self.tenant_id {
            None => true,
            Some(owner) => owner == tenant,
        }
    }
}

impl Entity for Category {
    type Id = CategoryCode;

    fn id(&self) -> &Self::Id {
        &self.code
    }
}
