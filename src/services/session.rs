//! Bearer session tokens for dashboard staff

use crate::config::AuthConfig;
use crate::error::{AppError, AuthenticationError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub email: String,
    /// Account id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 session tokens
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::try_hours(config.token_ttl_hours)
                .unwrap_or_else(|| Duration::hours(AuthConfig::MAX_TOKEN_TTL_HOURS)),
        }
    }

    pub fn issue(&self, account_id: Uuid, email: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = SessionClaims {
            email: email.to_string(),
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| AppError::internal("session expiry out of range"))?
                .timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("failed to sign session token: {}", e)))
    }

    /// Signature and expiry are the only checks; there is no revocation list.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let err = match e.kind() {
                    ErrorKind::ExpiredSignature => AuthenticationError::TokenExpired,
                    _ => AuthenticationError::InvalidToken {
                        reason: e.to_string(),
                    },
                };
                AppError::authentication(err)
            })
    }
}

/// Pull the token out of an `Authorization` header value
pub fn extract_token(header_value: &str) -> Result<&str, AppError> {
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::authentication(AuthenticationError::InvalidTokenFormat))?
        .trim();

    if token.is_empty() {
        return Err(AppError::authentication(AuthenticationError::MissingToken));
    }
    Ok(token)
}
