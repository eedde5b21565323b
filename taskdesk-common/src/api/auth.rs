//! Admin authentication primitives
//!
//! - Passwords (users and agents) are stored as bcrypt hashes, cost 10
//! - Admins authenticate with an HS256 bearer token carrying `{ id, role, iat, exp }`
//! - Tokens expire 24 hours after issue
//!
//! # Pure Functions
//!
//! No HTTP framework dependencies. The server crate maps `AuthError` onto
//! 401/403 responses in its middleware.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Role string granted to every logged-in admin
pub const ADMIN_ROLE: &str = "admin";

/// Token lifetime
pub const TOKEN_TTL_HOURS: i64 = 24;

const BCRYPT_COST: u32 = 10;

/// Authentication error types
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Token malformed, badly signed, or expired
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token could not be signed
    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    /// bcrypt failure while hashing or verifying
    #[error("Password hash error: {0}")]
    PasswordHash(String),
}

/// Bearer token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id (UUID string)
    pub id: String,
    pub role: String,
    /// Issued at, Unix seconds
    pub iat: i64,
    /// Expiry, Unix seconds
    pub exp: i64,
}

impl Claims {
    /// Admin claims issued at `issued_at` (Unix seconds)
    pub fn admin(user_id: Uuid, issued_at: i64) -> Self {
        Self {
            id: user_id.to_string(),
            role: ADMIN_ROLE.to_string(),
            iat: issued_at,
            exp: issued_at + TOKEN_TTL_HOURS * 3600,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Sign arbitrary claims
pub fn encode_claims(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenCreation(e.to_string()))
}

/// Issue a 24h admin token for `user_id`
///
/// # Examples
///
/// ```
/// use taskdesk_common::api::auth::{issue_token, verify_token};
/// use uuid::Uuid;
///
/// let user_id = Uuid::new_v4();
/// let token = issue_token(user_id, "secret").unwrap();
/// let claims = verify_token(&token, "secret").unwrap();
/// assert_eq!(claims.id, user_id.to_string());
/// assert!(claims.is_admin());
/// ```
pub fn issue_token(user_id: Uuid, secret: &str) -> Result<String, AuthError> {
    encode_claims(&Claims::admin(user_id, Utc::now().timestamp()), secret)
}

/// Verify signature and expiry, returning the claims
///
/// Role is not checked here; callers decide what a non-admin token may do.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Hash a plaintext password (bcrypt, cost 10)
///
/// CPU-bound; async callers should run it on a blocking thread.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Check a plaintext password against a stored bcrypt hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, password_hash).map_err(|e| AuthError::PasswordHash(e.to_string()))
}
