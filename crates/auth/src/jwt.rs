//! Bearer token verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use crate::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a raw bearer token and yields its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HS256 shared-secret validator.
///
/// Timestamps live in `issued_at` / `expires_at` rather than the registered
/// `iat` / `exp` claims, so the library's own time checks are disabled and
/// [`validate_claims`] runs after decoding.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gymhub_core::UserId;
    use jsonwebtoken::{EncodingKey, Header, encode};

    use crate::Role;

    const SECRET: &[u8] = b"test-secret";

    fn mint(claims: &JwtClaims, secret: &[u8]) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            role: Role::Trainer,
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn round_trips_a_valid_token() {
        let now = Utc::now();
        let expected = claims(now);
        let token = mint(&expected, SECRET);
        let got = Hs256JwtValidator::new(SECRET).validate(&token, now).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let token = mint(&claims(now), b"other");
        let err = Hs256JwtValidator::new(SECRET).validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }

    #[test]
    fn rejects_expired_token_after_signature_check() {
        let now = Utc::now();
        let token = mint(&claims(now), SECRET);
        let later = now + Duration::hours(2);
        let err = Hs256JwtValidator::new(SECRET).validate(&token, later).unwrap_err();
        assert_eq!(err, TokenValidationError::Expired);
    }

    #[test]
    fn rejects_garbage() {
        let err = Hs256JwtValidator::new(SECRET)
            .validate("not-a-token", Utc::now())
            .unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }
}
