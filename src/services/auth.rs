//! Login token signing and verification
//!
//! Tokens are stateless HS256 JWTs. Nothing is stored server-side; validity
//! is decided entirely by the signature and the `exp` claim.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::db::UserRecord;

/// Password accepted for every user at login.
///
/// There is no per-user credential: a login succeeds when the username
/// exists and this value is supplied.
pub const SHARED_LOGIN_PASSWORD: &str = "secret";

/// Claims embedded in a login token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Username at the time of login
    pub username: String,
    /// User ID
    pub id: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Signs and verifies login tokens with a single shared secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime_secs: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime_secs,
        }
    }

    /// Issue a token for `user`, valid from now for the configured lifetime
    pub fn sign(&self, user: &UserRecord) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now().timestamp();
        self.sign_claims(&TokenClaims {
            username: user.username.clone(),
            id: user.id.clone(),
            iat: now,
            exp: now + self.lifetime_secs,
        })
    }

    pub fn sign_claims(&self, claims: &TokenClaims) -> jsonwebtoken::errors::Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
    }

    /// Check signature and expiry, returning the embedded claims
    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<TokenClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        tracing::debug!(user_id = %data.claims.id, "Token verified");
        Ok(data.claims)
    }
}
