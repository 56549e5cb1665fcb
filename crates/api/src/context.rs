use quotaledger_auth::{Actor, Role};
use quotaledger_core::{TenantId, UserId};

/// Tenant context for a request.
///
/// This is immutable and must be present for all ledger routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Principal context for a request (authenticated actor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    actor: Actor,
}

impl PrincipalContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn user_id(&self) -> UserId {
        self.actor.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.actor.roles
    }
}
