use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use super::cookies::ACCESS_COOKIE;
use crate::{error::AppError, state::AppState, users::repo_types::Role};

/// Caller identity taken from a verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = match jar.get(ACCESS_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => bearer(parts)
                .map(str::to_string)
                .ok_or_else(|| AppError::unauthorized("authentication required"))?,
        };

        let claims = state.jwt.verify_access(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::unauthorized("invalid or expired token")
        })?;

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

/// An [`AuthUser`] whose token and stored record both carry the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claimed = AuthUser::from_request_parts(parts, state).await?;
        if !claimed.is_admin() {
            warn!(user_id = %claimed.id, "admin route denied");
            return Err(AppError::forbidden());
        }

        // Tokens outlive demotions and deletions; the stored role wins.
        let stored = state
            .users
            .find_by_id(claimed.id)
            .await?
            .ok_or_else(|| AppError::unauthorized("user not found"))?;
        if !stored.is_admin() {
            warn!(user_id = %stored.id, "stale admin token denied");
            return Err(AppError::forbidden());
        }
        Ok(AdminUser(AuthUser {
            id: stored.id,
            role: stored.role,
        }))
    }
}
