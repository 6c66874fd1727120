use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument};

use super::{
    cookies::{clear_session, set_session, REFRESH_COOKIE},
    dto::{LoginRequest, RegisterRequest, SessionResponse},
    extractors::AuthUser,
    services::{self, Session},
};
use crate::{
    error::{AppError, AppJson, AppResult},
    state::AppState,
    users::dto::PublicUser,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn session_reply(state: &AppState, jar: CookieJar, session: Session) -> (CookieJar, Json<SessionResponse>) {
    let jar = set_session(
        jar,
        &state.config.cookies,
        session.tokens,
        session.access_ttl,
        session.refresh_ttl,
    );
    (jar, Json(SessionResponse { user: session.user.into() }))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let session = services::register(&state, &payload.email, payload.password, &payload.name).await?;
    Ok((StatusCode::CREATED, session_reply(&state, jar, session)))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let session = services::login(&state, &payload.email, payload.password).await?;
    Ok(session_reply(&state, jar, session))
}

#[instrument(skip(state, jar))]
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> AppResult<impl IntoResponse> {
    let token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let session = services::refresh(&state, token.as_deref()).await?;
    Ok(session_reply(&state, jar, session))
}

#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar, user: Option<AuthUser>) -> impl IntoResponse {
    if let Some(user) = user {
        info!(user_id = %user.id, "user logged out");
    }
    (StatusCode::NO_CONTENT, clear_session(jar, &state.config.cookies))
}

#[instrument(skip(state))]
pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<PublicUser>> {
    let user = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("user not found"))?;
    Ok(Json(user.into()))
}
