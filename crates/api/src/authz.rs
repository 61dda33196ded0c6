//! API-side authorization guard for commands.
//!
//! Role and ownership checks are explicit predicates invoked at the top of
//! each operation (before dispatch), keeping domain aggregates and infra
//! auth-agnostic.

use waxmarket_auth::{
    acting_provider, authorize, AuthzError, CommandAuthorization, Permission, Principal,
};
use waxmarket_core::ProviderId;

use crate::context::PrincipalContext;

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = resolve_principal(principal);

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Check a single permission for routes whose command is built later
/// (e.g. inside an application service).
pub fn authorize_permission(
    principal: &PrincipalContext,
    permission: &Permission,
) -> Result<(), AuthzError> {
    authorize(&resolve_principal(principal), permission)
}

/// Resolve the verified provider the caller acts as.
pub fn require_provider(principal: &PrincipalContext) -> Result<ProviderId, AuthzError> {
    acting_provider(&resolve_principal(principal))
}

pub fn is_admin(principal: &PrincipalContext) -> bool {
    principal.roles().iter().any(|r| r.as_str() == "admin")
}

fn resolve_principal(ctx: &PrincipalContext) -> Principal {
    Principal {
        principal_id: ctx.principal_id(),
        roles: ctx.roles().to_vec(),
        permissions: permissions_from_roles(ctx),
        provider: ctx.provider(),
    }
}

/// Minimal role→permission mapping.
///
/// This is intentionally simple until a real policy source exists (e.g.
/// DB-backed). "admin" grants all permissions.
fn permissions_from_roles(ctx: &PrincipalContext) -> Vec<Permission> {
    let mut permissions = Vec::new();

    for role in ctx.roles() {
        match role.as_str() {
            "admin" => return vec![Permission::new("*")],
            "buyer" => {
                permissions.push(Permission::new("orders.place"));
                permissions.push(Permission::new("orders.view"));
            }
            "provider" => {
                permissions.push(Permission::new("catalog.products.list"));
                permissions.push(Permission::new("catalog.products.update"));
                permissions.push(Permission::new("catalog.products.bulk"));
                permissions.push(Permission::new("inventory.stock.set"));
                permissions.push(Permission::new("inventory.stock.adjust"));
                permissions.push(Permission::new("orders.fulfill"));
                permissions.push(Permission::new("orders.pending.view"));
            }
            _ => {}
        }
    }

    permissions
}
