use waxmarket_auth::{PrincipalId, ProviderIdentity, Role};

/// Principal context for a request (authenticated identity + roles).
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
    provider: Option<ProviderIdentity>,
}

impl PrincipalContext {
    pub fn new(
        principal_id: PrincipalId,
        roles: Vec<Role>,
        provider: Option<ProviderIdentity>,
    ) -> Self {
        Self {
            principal_id,
            roles,
            provider,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn provider(&self) -> Option<ProviderIdentity> {
        self.provider
    }
}
