use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{dto::CommentBody, repo_types::CommentView, services};
use crate::{
    auth::AuthUser,
    error::{AppJson, AppPath, AppQuery, AppResult},
    pagination::Pagination,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/:key/comments",
            get(list_comments).post(add_comment),
        )
        .route("/comments/:id", patch(edit_comment).delete(delete_comment))
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    AppPath(key): AppPath<String>,
    AppQuery(page): AppQuery<Pagination>,
) -> AppResult<Json<Vec<CommentView>>> {
    Ok(Json(services::list_comments(&state, viewer, &key, page).await?))
}

#[instrument(skip(state, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    author: AuthUser,
    AppPath(key): AppPath<String>,
    AppJson(payload): AppJson<CommentBody>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let comment = services::add_comment(&state, author, &key, &payload.body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state, payload))]
pub async fn edit_comment(
    State(state): State<AppState>,
    actor: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<CommentBody>,
) -> AppResult<Json<CommentView>> {
    Ok(Json(services::edit_comment(&state, actor, id, &payload.body).await?))
}

#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    actor: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    services::delete_comment(&state, actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
