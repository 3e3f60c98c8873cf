//! Caller identity resolution.
//!
//! Handlers never decide who the caller is; they receive a [`UserId`]
//! produced by the [`IdentityResolver`] selected in configuration.

use crate::config::{AuthStrategy, HostedStoreConfig, PantryConfig};
use crate::models::UserId;
use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::error::AppError;
use service_core::observability::trace_headers;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingToken,

    #[error("Authorization header must be 'Bearer <token>'")]
    MalformedHeader,

    #[error("Invalid or expired token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Token rejected by auth provider")]
    Rejected,

    #[error("Auth provider unavailable: {0}")]
    Provider(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Provider(_) => {
                AppError::BadGateway("Authentication provider unavailable".to_string())
            }
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<UserId, AuthError>;
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

/// Every request resolves to the same configured user.
pub struct StaticIdentityResolver {
    user_id: UserId,
}

impl StaticIdentityResolver {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<UserId, AuthError> {
        Ok(self.user_id.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
}

/// Verifies HS256 bearer JWTs locally and uses `sub` as the identity.
pub struct JwtIdentityResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    pub fn new(secret: &Secret<String>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let token = bearer_token(headers)?;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(AuthError::InvalidToken)?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::Rejected);
        }

        Ok(UserId::new(data.claims.sub))
    }
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: Option<String>,
}

/// Hands the bearer token to the hosted auth provider's "get user" endpoint.
pub struct DelegatedTokenResolver {
    client: Client,
    user_endpoint: String,
    api_key: Secret<String>,
}

impl DelegatedTokenResolver {
    pub fn new(hosted: &HostedStoreConfig, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::Config(anyhow::anyhow!("Failed to build auth HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            user_endpoint: format!("{}/auth/v1/user", hosted.url),
            api_key: hosted.key.clone(),
        })
    }
}

#[async_trait]
impl IdentityResolver for DelegatedTokenResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let token = bearer_token(headers)?;

        let response = self
            .client
            .get(&self.user_endpoint)
            .headers(trace_headers())
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Auth provider request failed");
                AuthError::Provider(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Rejected);
        }
        if !status.is_success() {
            tracing::error!(status = %status, "Auth provider returned an error");
            return Err(AuthError::Provider(format!("status {}", status)));
        }

        let user: ProviderUser = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Auth provider returned an unreadable user");
            AuthError::Rejected
        })?;

        user.id
            .filter(|id| !id.is_empty())
            .map(UserId::new)
            .ok_or(AuthError::Rejected)
    }
}

pub fn build_identity_resolver(
    config: &PantryConfig,
) -> Result<Arc<dyn IdentityResolver>, AppError> {
    let missing = |what: &str| AppError::Config(anyhow::anyhow!("{} is not configured", what));

    let resolver: Arc<dyn IdentityResolver> = match config.auth.strategy {
        AuthStrategy::Static => {
            let user_id = config
                .auth
                .static_user_id
                .clone()
                .ok_or_else(|| missing("AUTH_STATIC_USER_ID"))?;
            tracing::warn!(user_id = %user_id, "Static identity in use; every caller shares one pantry");
            Arc::new(StaticIdentityResolver::new(UserId::new(user_id)))
        }
        AuthStrategy::Delegated => {
            let hosted = config
                .store
                .hosted
                .as_ref()
                .ok_or_else(|| missing("STORE_URL"))?;
            Arc::new(DelegatedTokenResolver::new(
                hosted,
                Duration::from_secs(config.store.timeout_secs),
            )?)
        }
        AuthStrategy::Jwt => {
            let secret = config
                .auth
                .jwt_secret
                .as_ref()
                .ok_or_else(|| missing("AUTH_JWT_SECRET"))?;
            Arc::new(JwtIdentityResolver::new(
                secret,
                config.auth.jwt_audience.as_deref(),
            ))
        }
    };

    tracing::info!(strategy = ?config.auth.strategy, "Identity resolver initialized");
    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        aud: Option<&'a str>,
    }

    fn token(sub: &str, secret: &str, ttl_minutes: i64, aud: Option<&str>) -> String {
        let claims = Claims {
            sub,
            exp: (Utc::now() + ChronoDuration::minutes(ttl_minutes)).timestamp(),
            aud,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    fn resolver(audience: Option<&str>) -> JwtIdentityResolver {
        JwtIdentityResolver::new(&Secret::new("shared-secret".to_string()), audience)
    }

    #[test]
    fn bearer_token_parsing() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer")),
            Err(AuthError::MalformedHeader)
        ));
        assert_eq!(bearer_token(&headers("bearer abc.def")).unwrap(), "abc.def");
    }

    #[tokio::test]
    async fn static_resolver_ignores_headers() {
        let resolver = StaticIdentityResolver::new(UserId::new("fixed-user"));
        let id = resolver.resolve(&HeaderMap::new()).await.unwrap();
        assert_eq!(id.as_str(), "fixed-user");
    }

    #[tokio::test]
    async fn jwt_resolver_returns_subject() {
        let token = token("user-1", "shared-secret", 10, Some("authenticated"));
        let id = resolver(None)
            .resolve(&headers(&format!("Bearer {}", token)))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "user-1");
    }

    #[tokio::test]
    async fn jwt_resolver_rejects_wrong_secret_and_expiry() {
        let forged = token("user-1", "other-secret", 10, None);
        assert!(matches!(
            resolver(None)
                .resolve(&headers(&format!("Bearer {}", forged)))
                .await,
            Err(AuthError::InvalidToken(_))
        ));

        let expired = token("user-1", "shared-secret", -10, None);
        assert!(matches!(
            resolver(None)
                .resolve(&headers(&format!("Bearer {}", expired)))
                .await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn jwt_resolver_checks_audience_when_configured() {
        let token = token("user-1", "shared-secret", 10, Some("anon"));
        assert!(resolver(Some("authenticated"))
            .resolve(&headers(&format!("Bearer {}", token)))
            .await
            .is_err());
    }

    #[test]
    fn provider_failures_map_to_bad_gateway() {
        let err: AppError = AuthError::Provider("timeout".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let err: AppError = AuthError::MissingToken.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
