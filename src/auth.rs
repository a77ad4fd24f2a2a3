use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use bcrypt::{hash, verify, BcryptError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Every credential is valid for exactly this long after issuance.
pub const TOKEN_VALIDITY_SECS: i64 = 60 * 60;

pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    hash(password, cost)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Token not found")]
    Missing,

    #[error("Token is malformed or has an invalid signature")]
    Malformed,

    #[error("Token has expired")]
    Expired,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 bearer tokens. Holds no per-session state.
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        username: Option<&str>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(user_id, username, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        username: Option<&str>,
        issued_at: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: user_id,
            username: username.map(str::to_string),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::seconds(TOKEN_VALIDITY_SECS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthFailure> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthFailure::Expired,
                _ => AuthFailure::Malformed,
            })
    }
}

/// Identity taken from a verified `Authorization: Bearer <token>` header.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthFailure::Missing)?;

        let claims = state.tokens.verify(token).map_err(|failure| {
            tracing::debug!(?failure, "rejected bearer token");
            failure
        })?;

        Ok(AuthUser {
            id: claims.sub,
            username: claims.username,
        })
    }
}
