use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{config::JwtConfig, errors::RequestError, models::Auth, AppState};

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Surrogate id of the identity, as a string.
    sub: String,
    uuid: String,
    username: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Identity recovered from a valid bearer token. Handlers that take this as
/// an argument are only reached by authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub id: i64,
    pub uuid: String,
    pub username: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for VerifiedIdentity {
    type Rejection = RequestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(header) => Some(header.to_str().map_err(|_| {
                RequestError::Unauthorized("Authorization header is not valid text".to_string())
            })?),
            None => None,
        };
        verify_header(header, &state.jwt)
    }
}

pub fn issue_token(auth: &Auth, config: &JwtConfig) -> Result<String> {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        sub: auth.id.to_string(),
        uuid: auth.uuid.clone(),
        username: auth.username.clone(),
        role: auth.role_name.clone(),
        iat: now.unix_timestamp(),
        exp: (now + Duration::hours(config.expiry_hours)).unix_timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .context("Failed to generate jwt token")
}

/// Checks the `Authorization` header value and returns the identity it carries.
pub fn verify_header(
    header: Option<&str>,
    config: &JwtConfig,
) -> std::result::Result<VerifiedIdentity, RequestError> {
    let header = header
        .ok_or_else(|| RequestError::Unauthorized("Missing authorization header".to_string()))?;
    let token = header
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| RequestError::Unauthorized("Malformed authorization header".to_string()))?;
    verify_token(token, config)
}

pub fn verify_token(
    token: &str,
    config: &JwtConfig,
) -> std::result::Result<VerifiedIdentity, RequestError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => RequestError::Unauthorized("Token expired".to_string()),
        _ => {
            tracing::debug!(error = %e, "Token verification failed");
            RequestError::Unauthorized("Invalid token".to_string())
        }
    })?;

    let claims = token_data.claims;
    let id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| RequestError::Unauthorized("Invalid token".to_string()))?;

    Ok(VerifiedIdentity {
        id,
        uuid: claims.uuid,
        username: claims.username,
    })
}

pub async fn verify_password_argon2(password: String, hash: &str) -> Result<bool> {
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow::anyhow!("Stored password hash is malformed"))?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiry_hours: 1,
        }
    }

    fn auth() -> Auth {
        let now = NaiveDateTime::from_timestamp_opt(0, 0).unwrap();
        Auth {
            id: 7,
            uuid: "b0a3c1de-0000-4000-8000-000000000007".to_string(),
            username: "writer".to_string(),
            password: String::new(),
            role_name: "WRITER".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn reason(error: RequestError) -> String {
        match error {
            RequestError::Unauthorized(reason) => reason,
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn issued_tokens_verify_to_the_same_identity() {
        let token = issue_token(&auth(), &config()).unwrap();
        let identity = verify_header(Some(&format!("Bearer {token}")), &config()).unwrap();
        assert_eq!(
            identity,
            VerifiedIdentity {
                id: 7,
                uuid: "b0a3c1de-0000-4000-8000-000000000007".to_string(),
                username: "writer".to_string(),
            }
        );
    }

    #[test]
    fn missing_or_malformed_headers_are_rejected() {
        assert_eq!(
            reason(verify_header(None, &config()).unwrap_err()),
            "Missing authorization header"
        );
        let token = issue_token(&auth(), &config()).unwrap();
        assert_eq!(
            reason(verify_header(Some(&format!("Token {token}")), &config()).unwrap_err()),
            "Malformed authorization header"
        );
        assert_eq!(
            reason(verify_header(Some("Bearer "), &config()).unwrap_err()),
            "Malformed authorization header"
        );
    }

    #[test]
    fn tokens_signed_with_another_secret_are_invalid() {
        let other = JwtConfig {
            secret: "another-secret".to_string(),
            expiry_hours: 1,
        };
        let token = issue_token(&auth(), &other).unwrap();
        assert_eq!(
            reason(verify_token(&token, &config()).unwrap_err()),
            "Invalid token"
        );
        assert_eq!(
            reason(verify_token("not-a-jwt", &config()).unwrap_err()),
            "Invalid token"
        );
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let expired = JwtConfig {
            secret: "test-secret".to_string(),
            expiry_hours: -1,
        };
        let token = issue_token(&auth(), &expired).unwrap();
        assert_eq!(
            reason(verify_token(&token, &config()).unwrap_err()),
            "Token expired"
        );
    }

    #[tokio::test]
    async fn password_hashes_verify_only_the_original_password() {
        let hash = hash_password_argon2("hunter2".to_string()).await.unwrap();
        assert!(verify_password_argon2("hunter2".to_string(), &hash)
            .await
            .unwrap());
        assert!(!verify_password_argon2("hunter3".to_string(), &hash)
            .await
            .unwrap());
    }
}
