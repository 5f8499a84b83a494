//! HS256 token issuance and verification.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use beacon_core::{Principal, Role};

use crate::errors::AuthError;

/// Token lifetime.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Signed claim set: numeric subject id, role, issue and expiry timestamps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Encoding/decoding key pair derived from one shared secret.
///
/// Decoding pins the algorithm to HS256, so a token signed any other way
/// (including `alg: none`) is rejected outright.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Issue a token for the given user.
    pub fn issue(&self, user_id: i64, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        self.sign(&claims)
    }

    /// Sign an explicit claim set. Exposed for crafting edge-case tokens in
    /// tests; production callers go through [`TokenKeys::issue`].
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding).map_err(AuthError::from)
    }

    /// Verify a token and extract the principal. Fails closed on expiry,
    /// bad signature, wrong algorithm, or structural damage.
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(Principal::new(data.claims.sub, data.claims.role))
    }
}
