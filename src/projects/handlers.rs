use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreateProjectRequest, ProjectListQuery, ProjectView, UpdateProjectRequest},
    repo_types::{Counter, ProjectStats},
    services,
};
use crate::{
    auth::{AdminUser, AuthUser},
    error::{AppJson, AppPath, AppQuery, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:key",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/:key/stats", get(get_stats))
        .route("/projects/:key/views", post(record_view))
        .route("/projects/:key/likes", post(record_like))
}

#[instrument(skip(state))]
pub async fn list_projects(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    AppQuery(query): AppQuery<ProjectListQuery>,
) -> AppResult<Json<Vec<ProjectView>>> {
    Ok(Json(services::list_projects(&state, viewer, &query).await?))
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    AppPath(key): AppPath<String>,
) -> AppResult<Json<ProjectView>> {
    let (project, stats) = services::find_visible(&state, viewer, &key).await?;
    Ok(Json(services::render(&state, project, &stats).await?))
}

#[instrument(skip(state, body))]
pub async fn create_project(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(body): AppJson<CreateProjectRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<ProjectView>)> {
    let (project, stats) = services::create_project(&state, admin, body).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/projects/{}", project.id)) {
        headers.insert(header::LOCATION, location);
    }
    let view = services::render(&state, project, &stats).await?;
    Ok((StatusCode::CREATED, headers, Json(view)))
}

#[instrument(skip(state, body))]
pub async fn update_project(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    AppPath(key): AppPath<String>,
    AppJson(body): AppJson<UpdateProjectRequest>,
) -> AppResult<Json<ProjectView>> {
    let (project, stats) = services::update_project(&state, &key, body).await?;
    Ok(Json(services::render(&state, project, &stats).await?))
}

#[instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    AppPath(key): AppPath<String>,
) -> AppResult<StatusCode> {
    services::delete_project(&state, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    AppPath(key): AppPath<String>,
) -> AppResult<Json<ProjectStats>> {
    let (_, stats) = services::find_visible(&state, viewer, &key).await?;
    Ok(Json(stats))
}

/// Server half of the client's optimistic view counter.
#[instrument(skip(state))]
pub async fn record_view(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    AppPath(key): AppPath<String>,
) -> AppResult<Json<ProjectStats>> {
    Ok(Json(services::record(&state, viewer, &key, Counter::Views).await?))
}

#[instrument(skip(state))]
pub async fn record_like(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(key): AppPath<String>,
) -> AppResult<Json<ProjectStats>> {
    Ok(Json(services::record(&state, Some(user), &key, Counter::Likes).await?))
}
