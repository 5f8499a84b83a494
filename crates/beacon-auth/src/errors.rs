//! Auth error types.

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token is past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// Token failed signature, algorithm, or structural checks.
    #[error("invalid token")]
    InvalidToken(String),

    /// Email/password pair did not match a stored user.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Hashing backend failure (not a mismatch).
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        }
    }
}
