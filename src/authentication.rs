use std::sync::Arc;

use crate::errors::RequestError;
use crate::AppState;
use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const SESSION_TOKEN_TTL: time::Duration = time::Duration::days(2);
pub const RESET_TOKEN_TTL: time::Duration = time::Duration::minutes(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TokenKind {
    Session,
    Reset,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub id: i64,
    pub email: String,
    kind: TokenKind,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    email: String,
    kind: TokenKind,
    exp: i64,
}

/// The caller identified by a valid `Authorization: Bearer <token>` header.
/// Rejects the request with 401 when the header is missing or the token
/// does not verify.
#[derive(Debug)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let state = parts
            .extensions
            .get::<Arc<AppState>>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("AppState extension missing"))?;

        let header = match parts.headers.get("Authorization") {
            Some(header) => header,
            None => return Err(RequestError::NotAuthorized("Token Missing")),
        };
        let header = match header.to_str() {
            Ok(header) => header,
            Err(_) => {
                tracing::debug!("Authorization header is not valid UTF-8");
                return Err(RequestError::NotAuthorized("Token is invalid"));
            }
        };

        let token = match header.strip_prefix("Bearer ") {
            Some(token) => token.trim(),
            None => {
                tracing::debug!("Authorization header without Bearer prefix");
                return Err(RequestError::NotAuthorized("Token Missing"));
            }
        };

        let claims = verify_session_token(&state.config.jwt_secret, token)?;
        Ok(AuthUser {
            id: claims.id,
            email: claims.email,
        })
    }
}

fn encode_claims<T: Serialize>(secret: &str, claims: &T) -> Result<String> {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_ref()),
    )
    .context("Failed to generate jwt token")
}

fn expiry_after(ttl: time::Duration) -> i64 {
    (OffsetDateTime::now_utc() + ttl).unix_timestamp()
}

pub fn issue_session_token(secret: &str, id: i64, email: &str) -> Result<String> {
    let claims = SessionClaims {
        id,
        email: email.to_owned(),
        kind: TokenKind::Session,
        exp: expiry_after(SESSION_TOKEN_TTL),
    };
    encode_claims(secret, &claims)
}

pub fn verify_session_token(secret: &str, token: &str) -> Result<SessionClaims, RequestError> {
    let token_data = jsonwebtoken::decode::<SessionClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_ref()),
        &jsonwebtoken::Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "session token rejected");
        RequestError::NotAuthorized("Token is invalid")
    })?;
    let claims = token_data.claims;
    if claims.kind != TokenKind::Session {
        return Err(RequestError::NotAuthorized("Token is invalid"));
    }
    Ok(claims)
}

pub fn issue_reset_token(secret: &str, email: &str) -> Result<String> {
    issue_reset_token_with_ttl(secret, email, RESET_TOKEN_TTL)
}

pub(crate) fn issue_reset_token_with_ttl(
    secret: &str,
    email: &str,
    ttl: time::Duration,
) -> Result<String> {
    let claims = ResetClaims {
        email: email.to_owned(),
        kind: TokenKind::Reset,
        exp: expiry_after(ttl),
    };
    encode_claims(secret, &claims)
}

/// Returns the email the reset token was issued for.
pub fn verify_reset_token(secret: &str, token: &str) -> Result<String, RequestError> {
    let token_data = jsonwebtoken::decode::<ResetClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_ref()),
        &jsonwebtoken::Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "reset token rejected");
        RequestError::InvalidOrExpiredToken
    })?;
    let claims = token_data.claims;
    if claims.kind != TokenKind::Reset {
        return Err(RequestError::InvalidOrExpiredToken);
    }
    Ok(claims.email)
}

pub async fn verify_password_argon2(password: String, hash: &str) -> Result<bool> {
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow::anyhow!("Failed to parse password hash"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .context("Failed to verify password")?
}

pub async fn hash_password_argon2(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        let hash = PasswordHash::generate(Argon2::default(), password, salt.as_salt())
            .map_err(|_| anyhow::anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}
