use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
///
/// Roles are opaque strings on the wire; [`Role::permissions`] is the single
/// place where a role turns into capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const MANAGER: Role = Role(Cow::Borrowed("manager"));
    /// Harvest-ingestion process (e.g. a processor plant feed).
    pub const PROCESSOR: Role = Role(Cow::Borrowed("processor"));
    /// A holder viewing their own position.
    pub const HOLDER: Role = Role(Cow::Borrowed("holder"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Role -> permission policy. Unknown roles grant nothing.
    pub fn permissions(&self) -> Vec<Permission> {
        match self.as_str() {
            "admin" => vec![Permission::WILDCARD],
            "manager" => vec![
                Permission::BALANCES_READ,
                Permission::ACTIVITY_READ,
                Permission::TRANSFERS_PROPOSE,
                Permission::TRANSFERS_RETRACT,
                Permission::CONSUMPTION_RECORD,
                Permission::CONSUMPTION_RETRACT,
            ],
            "processor" => vec![Permission::BALANCES_READ, Permission::CONSUMPTION_RECORD],
            "holder" => vec![Permission::BALANCES_READ, Permission::ACTIVITY_READ],
            _ => Vec::new(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
