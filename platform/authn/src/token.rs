use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AuthnError;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    fn ttl_minutes(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_minutes,
            TokenKind::Refresh => self.refresh_ttl_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub kind: TokenKind,
    pub exp: i64,
    pub iat: i64,
}

pub fn issue_token(
    user_id: Uuid,
    kind: TokenKind,
    config: &AuthConfig,
) -> Result<String, AuthnError> {
    let now = Utc::now();
    let exp = now
        .checked_add_signed(Duration::minutes(config.ttl_minutes(kind)))
        .unwrap_or(now)
        .timestamp();
    let claims = SessionClaims {
        sub: user_id,
        kind,
        exp,
        iat: now.timestamp(),
    };
    jsonwebtoken::encode(&Header::default(), &claims, &config.encoding_key())
        .map_err(|err| AuthnError::Issue(err.to_string()))
}

/// Decodes `token` and checks that it is of the `expected` kind.
pub fn decode_token(
    token: &str,
    expected: TokenKind,
    config: &AuthConfig,
) -> Result<SessionClaims, AuthnError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    let claims = jsonwebtoken::decode::<SessionClaims>(token, &config.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AuthnError::Expired,
            _ => AuthnError::InvalidToken(err.to_string()),
        })?;
    if claims.kind != expected {
        return Err(AuthnError::WrongKind {
            expected: expected.as_str(),
        });
    }
    Ok(claims)
}
