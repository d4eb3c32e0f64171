//! Platform authentication helpers.
//!
//! Passwords are stored as argon2 PHC strings. Sessions are a pair of HS256
//! JWTs: a short-lived access token and a longer-lived refresh token, both
//! carried in HttpOnly cookies by the HTTP layer.

mod password;
mod token;

pub use password::{hash_password, verify_password};
pub use token::{AuthConfig, SessionClaims, TokenKind, decode_token, issue_token};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthnError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("expected a {expected} token")]
    WrongKind { expected: &'static str },
    #[error("failed to issue token: {0}")]
    Issue(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed")]
    MalformedHash,
}
