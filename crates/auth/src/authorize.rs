use std::collections::HashSet;

use thiserror::Error;

use waxmarket_core::ProviderId;

use crate::{Permission, PrincipalId, ProviderIdentity, Role};

/// A fully resolved principal for authorization decisions.
///
/// Construction of this object is intentionally decoupled from storage and
/// transport: the API derives it from claims and a policy source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub provider: Option<ProviderIdentity>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("caller has no provider identity")]
    NotAProvider,

    #[error("provider is not verified")]
    ProviderNotVerified,
}

/// Command-side authorization contract (checked at the command boundary).
///
/// Implement this on commands that require permissions.
/// The API layer should enforce these requirements before dispatching.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Resolve the provider a principal acts as.
///
/// Provider-only operations (stock mutation, item accept/reject, bulk
/// updates) require a **verified** provider identity.
pub fn acting_provider(principal: &Principal) -> Result<ProviderId, AuthzError> {
    let identity = principal.provider.ok_or(AuthzError::NotAProvider)?;
    if !identity.verified {
        return Err(AuthzError::ProviderNotVerified);
    }
    Ok(identity.provider_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(permissions: Vec<Permission>, provider: Option<ProviderIdentity>) -> Principal {
        Principal {
            principal_id: PrincipalId::new(),
            roles: vec![],
            permissions,
            provider,
        }
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = principal(vec![Permission::new("*")], None);
        assert!(authorize(&p, &Permission::new("inventory.stock.adjust")).is_ok());
    }

    #[test]
    fn exact_permission_grants() {
        let p = principal(vec![Permission::new("orders.place")], None);
        assert!(authorize(&p, &Permission::new("orders.place")).is_ok());
        assert!(matches!(
            authorize(&p, &Permission::new("orders.fulfill")),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn acting_provider_requires_verification() {
        let provider_id = ProviderId::new();

        let unverified = principal(
            vec![],
            Some(ProviderIdentity {
                provider_id,
                verified: false,
            }),
        );
        assert_eq!(
            acting_provider(&unverified),
            Err(AuthzError::ProviderNotVerified)
        );

        let verified = principal(
            vec![],
            Some(ProviderIdentity {
                provider_id,
                verified: true,
            }),
        );
        assert_eq!(acting_provider(&verified), Ok(provider_id));

        let none = principal(vec![], None);
        assert_eq!(acting_provider(&none), Err(AuthzError::NotAProvider));
    }
}
