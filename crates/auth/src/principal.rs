use serde::{Deserialize, Serialize};

use quotaledger_core::{HolderId, TenantId, UserId};

use crate::{Permission, Role};

/// An authenticated actor, already resolved by the caller.
///
/// This is the authorization boundary object: it states *which tenant* the
/// actor is acting within, which roles it holds there and, for holder-facing
/// logins, which single holder it may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub holder_scope: Option<HolderId>,
}

impl Actor {
    pub fn new(user_id: UserId, tenant_id: TenantId, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            tenant_id,
            roles,
            holder_scope: None,
        }
    }

    pub fn scoped_to_holder(mut self, holder: HolderId) -> Self {
        self.holder_scope = Some(holder);
        self
    }

    pub fn effective_permissions(&self) -> Vec<Permission> {
        let mut perms: Vec<Permission> = self.roles.iter().flat_map(Role::permissions).collect();
        perms.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        perms.dedup();
        perms
    }

    pub fn has_permission(&self, required: &Permission) -> bool {
        self.roles
            .iter()
            .flat_map(Role::permissions)
            .any(|p| p.grants(required))
    }
}
