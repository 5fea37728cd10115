use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{AppError, AppResult},
    permissions,
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` in place of a bearer token.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the HS256 bearer tokens issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id, which is also the primary key of `users`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the user plus the
/// effective permissions of every role they hold, loaded fresh from the
/// repository on each request so revoked roles take effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl AuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        permissions::has_permission(&self.permissions, permission)
    }

    /// `Forbidden` unless the user holds `permission`.
    pub fn require(&self, permission: &str) -> AppResult<()> {
        permissions::require(&self.permissions, permission)
    }

    /// Owners always pass; everyone else needs `permission`.
    pub fn require_owner_or(&self, owner_id: Uuid, permission: &str) -> AppResult<()> {
        if self.id == owner_id {
            return Ok(());
        }
        self.require(permission)
    }

    async fn resolve(repo: &RepositoryState, id: Uuid) -> AppResult<Option<Self>> {
        Ok(repo.get_user_profile(id).await?.map(|profile| AuthUser {
            id: profile.id,
            username: profile.username,
            roles: profile.roles,
            permissions: profile.permissions,
        }))
    }
}

fn has_credentials(parts: &Parts, env: &Env) -> bool {
    parts.headers.contains_key(header::AUTHORIZATION)
        || (*env == Env::Local && parts.headers.contains_key(LOCAL_USER_HEADER))
}

/// AuthUser extractor
///
/// Resolution order:
/// 1. An `AuthUser` already placed in the request extensions by a route layer.
/// 2. In `Env::Local`, a known user id in the `x-user-id` header.
/// 3. A `Bearer` JWT signed with `jwt_secret`, whose subject still exists.
///
/// Rejects with `AppError::Unauthorized` (401).
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let header_id = parts
                .headers
                .get(LOCAL_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());
            if let Some(user_id) = header_id {
                if let Some(user) = Self::resolve(&repo, user_id).await? {
                    parts.extensions.insert(user.clone());
                    return Ok(user);
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("expired bearer token"),
                other => tracing::debug!(reason = ?other, "rejected bearer token"),
            }
            AppError::Unauthorized
        })?;

        // A valid token for a deleted user is still rejected.
        let user = Self::resolve(&repo, token_data.claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// `Option<AuthUser>` for public routes that personalise their response.
/// Anonymous requests yield `None`; credentials that are present but invalid
/// are still rejected with 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        if parts.extensions.get::<AuthUser>().is_none() && !has_credentials(parts, &config.env) {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}
