//! `waxmarket-auth` — pure authentication/authorization boundary (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{acting_provider, authorize, AuthzError, CommandAuthorization, Principal};
pub use claims::{validate_claims, Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError};
pub use permissions::Permission;
pub use principal::{PrincipalId, ProviderIdentity};
pub use roles::Role;
