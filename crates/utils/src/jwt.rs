//! Bearer token verification.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: Uuid, role: Option<String>, ttl_secs: i64) -> Self {
        Self {
            sub,
            email: None,
            role,
            exp: Utc::now().timestamp() + ttl_secs,
        }
    }
}

/// Pull the token out of an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, JwtError> {
    header
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(JwtError::MissingToken)
}

pub fn decode_token(token: &str, secret: &[u8]) -> Result<Claims, JwtError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

pub fn encode_token(claims: &Claims, secret: &[u8]) -> Result<String, JwtError> {
    Ok(encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(None).is_err());
    }

    #[test]
    fn test_token_round_trip_and_wrong_secret() {
        let claims = Claims::new(Uuid::new_v4(), Some("admin".into()), 600);
        let token = encode_token(&claims, b"secret").unwrap();
        assert_eq!(decode_token(&token, b"secret").unwrap(), claims);
        assert!(decode_token(&token, b"other").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims::new(Uuid::new_v4(), None, -3600);
        let token = encode_token(&claims, b"secret").unwrap();
        assert!(decode_token(&token, b"secret").is_err());
    }
}
