//! HS256 JSON Web Tokens carrying the authenticated user id.
//!
//! Claims are `{sub, iat, exp}` with `sub` the decimal user id and times in
//! unix seconds. Nothing is stored server-side; a token is valid iff its
//! signature checks out under the shared secret and `exp` lies in the future.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Payload carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies tokens under one secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self, AuthError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(AuthError::SigningKey("secret must not be empty".into()));
        }
        if ttl <= Duration::zero() {
            return Err(AuthError::TokenLifetime);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    /// Lifetime of newly issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: i64, now: DateTime<Utc>) -> Result<String, AuthError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(AuthError::TokenLifetime)?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::SigningKey(e.to_string()))
    }

    /// Check signature and expiry, returning the user id. Every failure
    /// collapses into [`AuthError::InvalidOrExpiredCredential`].
    ///
    /// `exp` is exclusive: a token is dead at `now == exp`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<i64, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::InvalidOrExpiredCredential)?;
        let claims = data.claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::InvalidOrExpiredCredential);
        }
        claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidOrExpiredCredential)
    }
}
