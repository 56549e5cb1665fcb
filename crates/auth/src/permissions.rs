use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "ledger.transfers.propose").
/// A special wildcard permission `"*"` grants everything within the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    pub const BALANCES_READ: Permission = Permission(Cow::Borrowed("ledger.balances.read"));
    pub const ACTIVITY_READ: Permission = Permission(Cow::Borrowed("ledger.activity.read"));
    pub const TRANSFERS_PROPOSE: Permission = Permission(Cow::Borrowed("ledger.transfers.propose"));
    pub const TRANSFERS_RETRACT: Permission = Permission(Cow::Borrowed("ledger.transfers.retract"));
    pub const CONSUMPTION_RECORD: Permission = Permission(Cow::Borrowed("ledger.consumption.record"));
    pub const CONSUMPTION_RETRACT: Permission = Permission(Cow::Borrowed("ledger.consumption.retract"));
    pub const ENTITLEMENTS_MANAGE: Permission = Permission(Cow::Borrowed("ledger.entitlements.manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Whether holding `self` satisfies a requirement for `required`.
    pub fn grants(&self, required: &Permission) -> bool {
        self.is_wildcard() || self == required
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
