use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{
    jwt::TokenPair,
    password::{hash_password_async, verify_password_async},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    users::repo_types::{NewUser, User},
};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 100;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Normalized email, or 400.
pub fn validated_email(raw: &str) -> AppResult<String> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::bad_request("invalid email"));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validated_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::bad_request(format!(
            "name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

fn open_session(state: &AppState, user: User) -> AppResult<Session> {
    let keys = &state.jwt;
    let tokens = keys.sign_pair(user.id, user.role)?;
    Ok(Session {
        user,
        tokens,
        access_ttl: keys.access_ttl,
        refresh_ttl: keys.refresh_ttl,
    })
}

pub async fn register(state: &AppState, email: &str, password: String, name: &str) -> AppResult<Session> {
    let email = validated_email(email)?;
    validate_password(&password)?;
    let name = validated_name(name)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("email already registered".into()));
    }

    let password_hash = hash_password_async(password).await?;
    let user = state
        .users
        .create(NewUser {
            email,
            name,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, role = ?user.role, "user registered");
    open_session(state, user)
}

pub async fn login(state: &AppState, email: &str, password: String) -> AppResult<Session> {
    let email = validated_email(email)?;

    let limits = &state.config.rate_limit;
    let decision = state
        .limiter
        .hit(
            &format!("login:{email}"),
            limits.login_limit,
            Duration::from_secs(limits.login_window_secs),
        )
        .await?;
    if !decision.allowed {
        warn!(%email, "login rate limited");
        return Err(AppError::TooManyRequests {
            retry_after_secs: decision.retry_after_secs,
        });
    }
    debug!(%email, remaining = decision.remaining, "login attempt");

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::unauthorized("invalid credentials"));
    };

    if !verify_password_async(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    info!(user_id = %user.id, "user logged in");
    open_session(state, user)
}

pub async fn refresh(state: &AppState, refresh_token: Option<&str>) -> AppResult<Session> {
    let token = refresh_token.ok_or_else(|| AppError::unauthorized("missing refresh token"))?;
    let claims = state.jwt.verify_refresh(token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::unauthorized("invalid or expired refresh token")
    })?;

    // Role may have changed since the token was minted.
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("user not found"))?;
    open_session(state, user)
}
