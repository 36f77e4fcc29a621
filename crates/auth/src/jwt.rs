//! HS256 token codec.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtError {
    #[error("malformed or unverifiable token: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Verifies bearer tokens and returns their claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// Shared-secret (HS256) signer and validator.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks run in `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign claims into a compact token.
    pub fn issue(&self, claims: &JwtClaims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use almacen_core::UserId;
    use chrono::Duration;

    #[test]
    fn issued_token_validates() {
        let jwt = Hs256JwtValidator::new("test-secret");
        let now = Utc::now();
        let claims = JwtClaims::new(UserId::new(3), "ana@x.pe", Role::new("vendedor"), now, Duration::hours(1));
        let token = jwt.issue(&claims).unwrap();
        assert_eq!(jwt.validate(&token, now).unwrap(), claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let claims = JwtClaims::new(UserId::new(3), "ana@x.pe", Role::ADMIN, now, Duration::hours(1));
        let token = Hs256JwtValidator::new("one").issue(&claims).unwrap();
        assert!(matches!(
            Hs256JwtValidator::new("two").validate(&token, now),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn expiry_uses_supplied_clock() {
        let jwt = Hs256JwtValidator::new("s");
        let now = Utc::now();
        let claims = JwtClaims::new(UserId::new(3), "ana@x.pe", Role::ADMIN, now, Duration::minutes(5));
        let token = jwt.issue(&claims).unwrap();
        assert_eq!(
            jwt.validate(&token, now + Duration::minutes(6)),
            Err(JwtError::Claims(TokenValidationError::Expired))
        );
    }

    #[test]
    fn garbage_is_invalid() {
        let jwt = Hs256JwtValidator::new("s");
        assert!(matches!(jwt.validate("not.a.jwt", Utc::now()), Err(JwtError::Invalid(_))));
    }
}
