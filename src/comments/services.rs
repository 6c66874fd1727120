use tracing::info;
use uuid::Uuid;

use super::repo_types::CommentView;
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    pagination::Pagination,
    projects::services::find_visible,
    state::AppState,
    users::services::confirmed_admin,
};

pub const MAX_COMMENT_LEN: usize = 2000;

fn validated_body(raw: &str) -> AppResult<String> {
    let body = raw.trim();
    if body.is_empty() || body.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request(format!(
            "comment must be 1 to {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(body.to_string())
}

pub async fn list_comments(
    state: &AppState,
    viewer: Option<AuthUser>,
    project_key: &str,
    page: Pagination,
) -> AppResult<Vec<CommentView>> {
    let (project, _) = find_visible(state, viewer, project_key).await?;
    let page = page.clamped();
    Ok(state
        .comments
        .list_for_project(project.id, page.limit, page.offset)
        .await?)
}

pub async fn add_comment(
    state: &AppState,
    author: AuthUser,
    project_key: &str,
    body: &str,
) -> AppResult<CommentView> {
    let body = validated_body(body)?;
    // Drafts are only visible, and so only commentable, for admins.
    let (project, _) = find_visible(state, Some(author), project_key).await?;
    let comment = state.comments.create(project.id, author.id, &body).await?;
    info!(comment_id = %comment.id, project_id = %project.id, "comment added");
    Ok(comment)
}

pub async fn edit_comment(state: &AppState, actor: AuthUser, id: Uuid, body: &str) -> AppResult<CommentView> {
    let body = validated_body(body)?;
    let comment = state
        .comments
        .find(id)
        .await?
        .ok_or(AppError::NotFound("comment"))?;
    if comment.author_id != actor.id {
        return Err(AppError::Forbidden("only the author may edit a comment".into()));
    }
    state
        .comments
        .update_body(id, &body)
        .await?
        .ok_or(AppError::NotFound("comment"))
}

pub async fn delete_comment(state: &AppState, actor: AuthUser, id: Uuid) -> AppResult<()> {
    let comment = state
        .comments
        .find(id)
        .await?
        .ok_or(AppError::NotFound("comment"))?;
    if actor.id != comment.author_id && !confirmed_admin(state, actor).await? {
        return Err(AppError::forbidden());
    }
    if !state.comments.delete(id).await? {
        return Err(AppError::NotFound("comment"));
    }
    info!(comment_id = %id, actor = %actor.id, "comment deleted");
    Ok(())
}
