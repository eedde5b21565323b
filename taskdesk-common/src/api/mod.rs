//! API module for shared HTTP API functionality
//!
//! Contains ONLY framework-independent pieces: credential hashing, bearer-token
//! issue/verify, and shared response types. The server crate wraps these with
//! Axum extractors and middleware.

pub mod auth;
pub mod types;

pub use auth::{
    hash_password, issue_token, verify_password, verify_token, AuthError, Claims, ADMIN_ROLE,
    TOKEN_TTL_HOURS,
};
pub use types::MessageResponse;
