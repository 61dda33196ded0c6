use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use waxmarket_core::ProviderId;

use crate::{PrincipalId, ProviderIdentity, Role};

/// JWT claims model (transport-agnostic).
///
/// This is the minimal set of claims the marketplace expects once a token has
/// been decoded/verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// RBAC roles granted to the principal.
    pub roles: Vec<Role>,

    /// Provider identity, when the principal acts as a seller.
    pub provider: Option<ProviderIdentity>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate JWT claims.
///
/// Note: this validates the *claims* only. Signature verification / decoding
/// is done by a [`JwtValidator`] implementation.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Token decoder + claims validator.
///
/// Transport layers hold this as a trait object so the signing scheme can be
/// swapped without touching middleware.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// Wire shape of the token payload (standard `iat`/`exp` seconds).
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: Uuid,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    provider_id: Option<Uuid>,
    #[serde(default)]
    provider_verified: bool,
    iat: i64,
    exp: i64,
}

/// HS256 validator backed by `jsonwebtoken`.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time-window checks are done deterministically in `validate_claims`,
        // against a caller-supplied clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<WireClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;

        let wire = data.claims;
        let issued_at = Utc
            .timestamp_opt(wire.iat, 0)
            .single()
            .ok_or_else(|| TokenValidationError::Malformed("iat out of range".to_string()))?;
        let expires_at = Utc
            .timestamp_opt(wire.exp, 0)
            .single()
            .ok_or_else(|| TokenValidationError::Malformed("exp out of range".to_string()))?;

        let claims = JwtClaims {
            sub: PrincipalId::from_uuid(wire.sub),
            roles: wire.roles.into_iter().map(Role::new).collect(),
            provider: wire.provider_id.map(|id| ProviderIdentity {
                provider_id: ProviderId::from_uuid(id),
                verified: wire.provider_verified,
            }),
            issued_at,
            expires_at,
        };

        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(issued: DateTime<Utc>, expires: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: PrincipalId::new(),
            roles: vec![Role::new("buyer")],
            provider: None,
            issued_at: issued,
            expires_at: expires,
        }
    }

    #[test]
    fn accepts_claims_inside_window() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(5), now + Duration::minutes(5));
        assert!(validate_claims(&c, now).is_ok());
    }

    #[test]
    fn rejects_expired_claims() {
        let now = Utc::now();
        let c = claims(now - Duration::hours(2), now - Duration::hours(1));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));
    }

    #[test]
    fn rejects_future_issued_at() {
        let now = Utc::now();
        let c = claims(now + Duration::minutes(1), now + Duration::hours(1));
        assert_eq!(
            validate_claims(&c, now),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn rejects_inverted_window() {
        let now = Utc::now();
        let c = claims(now, now - Duration::minutes(1));
        assert_eq!(
            validate_claims(&c, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn hs256_round_trip() {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = Utc::now();
        let wire = WireClaims {
            sub: Uuid::now_v7(),
            roles: vec!["provider".to_string()],
            provider_id: Some(Uuid::now_v7()),
            provider_verified: true,
            iat: now.timestamp() - 10,
            exp: now.timestamp() + 600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &wire,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let validator = Hs256JwtValidator::new(b"test-secret".to_vec());
        let claims = validator.validate(&token, now).unwrap();
        assert_eq!(claims.roles, vec![Role::new("provider")]);
        let provider = claims.provider.unwrap();
        assert!(provider.verified);
    }

    #[test]
    fn hs256_rejects_wrong_secret() {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = Utc::now();
        let wire = WireClaims {
            sub: Uuid::now_v7(),
            roles: vec![],
            provider_id: None,
            provider_verified: false,
            iat: now.timestamp(),
            exp: now.timestamp() + 600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &wire,
            &EncodingKey::from_secret(b"secret-a"),
        )
        .unwrap();

        let validator = Hs256JwtValidator::new(b"secret-b".to_vec());
        assert!(matches!(
            validator.validate(&token, now),
            Err(TokenValidationError::Malformed(_))
        ));
    }
}
