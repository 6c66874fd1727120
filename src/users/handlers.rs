use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{PublicUser, UpdateUserRequest},
    services,
};
use crate::{
    auth::{AdminUser, AuthUser},
    error::{AppJson, AppPath, AppQuery, AppResult},
    pagination::Pagination,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    AppQuery(page): AppQuery<Pagination>,
) -> AppResult<Json<Vec<PublicUser>>> {
    let users = services::list_users(&state, page).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    actor: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(services::get_user(&state, actor, id).await?.into()))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    actor: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<UpdateUserRequest>,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(services::update_user(&state, actor, id, body).await?.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    actor: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    services::delete_user(&state, actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
