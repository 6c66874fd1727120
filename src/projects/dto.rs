use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Project, ProjectStats};
use crate::pagination::{Pagination, DEFAULT_LIMIT};

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub tag: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl ProjectListQuery {
    pub fn page(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
        .clamped()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub repo_url: Option<String>,
    pub live_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cover_key: Option<String>,
    #[serde(default)]
    pub published: bool,
}

/// Partial update; `null` clears an optional field.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub summary: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub body: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub repo_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub live_url: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_key: Option<Option<String>>,
    pub published: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct StatsView {
    pub views: i64,
    pub likes: i64,
}

impl From<&ProjectStats> for StatsView {
    fn from(s: &ProjectStats) -> Self {
        Self {
            views: s.views,
            likes: s.likes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectView {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub repo_url: Option<String>,
    pub live_url: Option<String>,
    pub tags: Vec<String>,
    pub cover_key: Option<String>,
    pub cover_url: Option<String>,
    pub published: bool,
    pub stats: StatsView,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ProjectView {
    pub fn new(project: Project, stats: &ProjectStats, cover_url: Option<String>) -> Self {
        Self {
            id: project.id,
            owner_id: project.owner_id,
            title: project.title,
            slug: project.slug,
            summary: project.summary,
            body: project.body,
            repo_url: project.repo_url,
            live_url: project.live_url,
            tags: project.tags,
            cover_key: project.cover_key,
            cover_url,
            published: project.published,
            stats: stats.into(),
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_tells_null_from_absent() {
        let req: UpdateProjectRequest =
            serde_json::from_str(r#"{"summary": null, "title": "New"}"#).unwrap();
        assert_eq!(req.summary, Some(None));
        assert_eq!(req.body, None);
        assert_eq!(req.title.as_deref(), Some("New"));

        let req: UpdateProjectRequest = serde_json::from_str(r#"{"cover_key": "k"}"#).unwrap();
        assert_eq!(req.cover_key, Some(Some("k".to_string())));
    }
}
