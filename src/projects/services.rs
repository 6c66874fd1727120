use std::collections::BTreeSet;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateProjectRequest, ProjectListQuery, ProjectView, UpdateProjectRequest},
    repo_types::{Counter, NewProject, Project, ProjectFilter, ProjectStats},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 32;

/// Lowercase ASCII alphanumerics; every other run collapses to one `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

fn validated_title(raw: &str) -> AppResult<String> {
    let title = raw.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::bad_request(format!(
            "title must be 1 to {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validated_slug(explicit: Option<&str>, title: &str) -> AppResult<String> {
    let slug = match explicit {
        Some(s) => {
            if !is_valid_slug(s) {
                return Err(AppError::bad_request(
                    "slug must be lowercase letters, digits and single dashes",
                ));
            }
            s.to_string()
        }
        None => slugify(title),
    };
    if slug.is_empty() {
        return Err(AppError::bad_request("title must contain letters or digits"));
    }
    // Lookups try the id form first, so such a slug would be unreachable.
    if Uuid::parse_str(&slug).is_ok() {
        return Err(AppError::bad_request("slug must not look like a project id"));
    }
    Ok(slug)
}

fn validated_url(field: &str, raw: Option<String>) -> AppResult<Option<String>> {
    let Some(url) = raw.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::bad_request(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(Some(url))
}

fn normalized_tags(raw: Vec<String>) -> AppResult<Vec<String>> {
    let mut seen = BTreeSet::new();
    let mut tags = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
            return Err(AppError::bad_request(format!(
                "tags must be 1 to {MAX_TAG_LEN} characters"
            )));
        }
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }
    if tags.len() > MAX_TAGS {
        return Err(AppError::bad_request(format!("at most {MAX_TAGS} tags")));
    }
    Ok(tags)
}

fn trimmed(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn visible_to(project: &Project, viewer: Option<AuthUser>) -> bool {
    project.published || viewer.is_some_and(|v| v.is_admin())
}

async fn lookup(state: &AppState, key: &str) -> AppResult<Option<(Project, ProjectStats)>> {
    Ok(match Uuid::parse_str(key) {
        Ok(id) => state.projects.find_by_id(id).await?,
        Err(_) => state.projects.find_by_slug(key).await?,
    })
}

/// `key` is a UUID or a slug; hidden drafts read as missing.
pub async fn find_visible(
    state: &AppState,
    viewer: Option<AuthUser>,
    key: &str,
) -> AppResult<(Project, ProjectStats)> {
    match lookup(state, key).await? {
        Some((project, stats)) if visible_to(&project, viewer) => Ok((project, stats)),
        _ => Err(AppError::NotFound("project")),
    }
}

async fn find_any(state: &AppState, key: &str) -> AppResult<(Project, ProjectStats)> {
    lookup(state, key).await?.ok_or(AppError::NotFound("project"))
}

pub async fn render(state: &AppState, project: Project, stats: &ProjectStats) -> AppResult<ProjectView> {
    let cover_url = match project.cover_key.as_deref() {
        Some(key) => Some(
            state
                .storage
                .presign_get(key, state.config.uploads.presign_ttl_secs)
                .await?,
        ),
        None => None,
    };
    Ok(ProjectView::new(project, stats, cover_url))
}

pub async fn list_projects(
    state: &AppState,
    viewer: Option<AuthUser>,
    query: &ProjectListQuery,
) -> AppResult<Vec<ProjectView>> {
    let page = query.page();
    let filter = ProjectFilter {
        include_drafts: viewer.is_some_and(|v| v.is_admin()),
        tag: trimmed(query.tag.clone()).map(|t| t.to_lowercase()),
        limit: page.limit,
        offset: page.offset,
    };
    let rows = state.projects.list(&filter).await?;
    let mut out = Vec::with_capacity(rows.len());
    for (project, stats) in rows {
        out.push(render(state, project, &stats).await?);
    }
    Ok(out)
}

pub async fn create_project(
    state: &AppState,
    owner: AuthUser,
    req: CreateProjectRequest,
) -> AppResult<(Project, ProjectStats)> {
    let title = validated_title(&req.title)?;
    let slug = validated_slug(req.slug.as_deref(), &title)?;
    let new = NewProject {
        owner_id: owner.id,
        slug,
        summary: trimmed(req.summary),
        body: req.body.filter(|b| !b.trim().is_empty()),
        repo_url: validated_url("repo_url", req.repo_url)?,
        live_url: validated_url("live_url", req.live_url)?,
        tags: normalized_tags(req.tags)?,
        cover_key: trimmed(req.cover_key),
        published: req.published,
        title,
    };
    let (project, stats) = state.projects.create(new).await?;
    info!(project_id = %project.id, slug = %project.slug, "project created");
    Ok((project, stats))
}

pub async fn update_project(
    state: &AppState,
    key: &str,
    req: UpdateProjectRequest,
) -> AppResult<(Project, ProjectStats)> {
    let (mut project, _) = find_any(state, key).await?;
    let previous_cover = project.cover_key.clone();

    if let Some(title) = req.title.as_deref() {
        project.title = validated_title(title)?;
    }
    if let Some(slug) = req.slug.as_deref() {
        project.slug = validated_slug(Some(slug), &project.title)?;
    }
    if let Some(summary) = req.summary {
        project.summary = trimmed(summary);
    }
    if let Some(body) = req.body {
        project.body = body.filter(|b| !b.trim().is_empty());
    }
    if let Some(url) = req.repo_url {
        project.repo_url = validated_url("repo_url", url)?;
    }
    if let Some(url) = req.live_url {
        project.live_url = validated_url("live_url", url)?;
    }
    if let Some(tags) = req.tags {
        project.tags = normalized_tags(tags)?;
    }
    if let Some(cover) = req.cover_key {
        project.cover_key = trimmed(cover);
    }
    if let Some(published) = req.published {
        project.published = published;
    }

    let (project, stats) = state
        .projects
        .save(&project)
        .await?
        .ok_or(AppError::NotFound("project"))?;

    if previous_cover.is_some() && previous_cover != project.cover_key {
        release_cover(state, previous_cover.as_deref(), project.id).await;
    }
    info!(project_id = %project.id, "project updated");
    Ok((project, stats))
}

pub async fn delete_project(state: &AppState, key: &str) -> AppResult<()> {
    let (project, _) = find_any(state, key).await?;
    let deleted = state
        .projects
        .delete(project.id)
        .await?
        .ok_or(AppError::NotFound("project"))?;
    release_cover(state, deleted.cover_key.as_deref(), deleted.id).await;
    info!(project_id = %deleted.id, "project deleted");
    Ok(())
}

/// Deletes a cover object `project_id` no longer uses, unless another project
/// still points at it. Best effort; failures are only logged.
async fn release_cover(state: &AppState, key: Option<&str>, project_id: Uuid) {
    let Some(key) = key else {
        return;
    };
    match state.projects.cover_in_use(key, project_id).await {
        Ok(false) => {}
        Ok(true) => {
            debug!(%key, "cover still shared, keeping object");
            return;
        }
        Err(e) => {
            warn!(error = %e, %key, "failed to check cover usage, keeping object");
            return;
        }
    }
    if let Err(e) = state.storage.delete_object(key).await {
        warn!(error = %e, %key, "failed to delete stored object");
    }
}

pub async fn record(
    state: &AppState,
    viewer: Option<AuthUser>,
    key: &str,
    counter: Counter,
) -> AppResult<ProjectStats> {
    let (project, _) = find_visible(state, viewer, key).await?;
    state
        .projects
        .bump(project.id, counter)
        .await?
        .ok_or(AppError::NotFound("project"))
}
