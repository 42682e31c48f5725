use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use jsonwebtoken::{errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::{errors::RequestError, state::AppState};

#[derive(Debug, Serialize, Deserialize)]
struct AuthClaim {
    sub: String,
    exp: i64,
}

/// Signs and verifies the bearer tokens handed out at login and registration.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: time::Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, expiry: time::Duration) -> Self {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<String> {
        let expiry_date = OffsetDateTime::now_utc() + self.expiry;
        let claim = AuthClaim {
            sub: user_id.to_string(),
            exp: expiry_date.unix_timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claim, &self.encoding)
            .context("Failed to generate jwt token")
    }

    pub fn verify(&self, token: &str) -> Result<i64, RequestError> {
        let token_data =
            jsonwebtoken::decode::<AuthClaim>(token, &self.decoding, &Validation::default())
                .map_err(|e| {
                    debug!("Rejected token: {e}");
                    match e.kind() {
                        ErrorKind::ExpiredSignature => RequestError::NotAuthorized("Token expired"),
                        _ => RequestError::NotAuthorized("Invalid token"),
                    }
                })?;
        token_data
            .claims
            .sub
            .parse()
            .map_err(|_| RequestError::NotAuthorized("Invalid token"))
    }
}

pub struct AuthUser {
    pub id: i64,
    pub token: String,
}

pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn get_id(&self) -> Option<i64> {
        self.0.as_ref().map(|a| a.id)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = RequestError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(header) => header,
            None => return Ok(MaybeUser(None)),
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|header| header.strip_prefix("Token "))
            .ok_or(RequestError::NotAuthorized("Invalid token"))?;

        let app = parts
            .extensions
            .get::<Arc<AppState>>()
            .ok_or_else(|| RequestError::Internal(anyhow!("application state is missing")))?;
        let id = app.keys.verify(token)?;

        Ok(MaybeUser(Some(AuthUser {
            id,
            token: token.to_string(),
        })))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = RequestError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        MaybeUser::from_request_parts(parts, state)
            .await?
            .0
            .ok_or(RequestError::NotAuthorized("Missing authorization token"))
    }
}

pub async fn verify_password_argon2(password: String, hash: &str) -> Result<bool> {
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow!("Failed to parse password hash"))?;
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
            .map_err(|_| anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new("test-secret", time::Duration::days(1))
    }

    #[test]
    fn issued_tokens_verify_to_their_subject() {
        let keys = keys();
        let token = keys.issue(42).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), 42);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let other = TokenKeys::new("another-secret", time::Duration::days(1));
        let token = other.issue(42).unwrap();
        assert!(matches!(
            keys().verify(&token),
            Err(RequestError::NotAuthorized("Invalid token"))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let stale = TokenKeys::new("test-secret", time::Duration::days(-1));
        let token = stale.issue(42).unwrap();
        assert!(matches!(
            keys().verify(&token),
            Err(RequestError::NotAuthorized("Token expired"))
        ));
    }

    #[tokio::test]
    async fn password_hashes_are_salted_and_verifiable() {
        let first = hash_password_argon2("hunter2".to_string()).await.unwrap();
        let second = hash_password_argon2("hunter2".to_string()).await.unwrap();
        assert_ne!(first, second);
        assert!(!first.contains("hunter2"));
        assert!(verify_password_argon2("hunter2".to_string(), &first)
            .await
            .unwrap());
        assert!(!verify_password_argon2("hunter3".to_string(), &first)
            .await
            .unwrap());
    }
}
