// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 access tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::{AccessClaims, AuthError};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Failure while signing a token.
#[derive(Debug, thiserror::Error)]
#[error("Failed to sign access token: {0}")]
pub struct TokenError(#[from] jsonwebtoken::errors::Error);

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies access tokens with a shared secret.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Sign a token for `principal_id`.
    pub fn issue(&self, principal_id: &Uuid) -> Result<IssuedToken, TokenError> {
        self.issue_at(principal_id, Utc::now())
    }

    fn issue_at(&self, principal_id: &Uuid, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.ttl;
        let claims = AccessClaims {
            sub: principal_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken {
            access_token,
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let token_data = decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            })?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret-key", Duration::minutes(30))
    }

    #[test]
    fn issued_token_verifies() {
        let issuer = issuer();
        let id = Uuid::new_v4();

        let token = issuer.issue(&id).unwrap();
        let claims = issuer.verify(&token.access_token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.exp, token.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = TokenIssuer::new(b"another-secret", Duration::minutes(30));
        let token = other.issue(&Uuid::new_v4()).unwrap();

        assert!(matches!(
            issuer().verify(&token.access_token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let long_ago = Utc::now() - Duration::hours(2);
        let token = issuer.issue_at(&Uuid::new_v4(), long_ago).unwrap();

        assert!(matches!(
            issuer.verify(&token.access_token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            issuer().verify("not-a-jwt"),
            Err(AuthError::MalformedToken)
        ));
    }
}
