use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub repo_url: Option<String>,
    pub live_url: Option<String>,
    pub tags: Vec<String>,
    pub cover_key: Option<String>, // object key from the upload endpoint
    pub published: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectStats {
    pub project_id: Uuid,
    pub views: i64,
    pub likes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Joined `projects` + `project_stats` row.
#[derive(Debug, FromRow)]
pub struct ProjectRow {
    #[sqlx(flatten)]
    pub project: Project,
    pub views: i64,
    pub likes: i64,
    pub stats_updated_at: OffsetDateTime,
}

impl ProjectRow {
    pub fn into_parts(self) -> (Project, ProjectStats) {
        let stats = ProjectStats {
            project_id: self.project.id,
            views: self.views,
            likes: self.likes,
            updated_at: self.stats_updated_at,
        };
        (self.project, stats)
    }
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub owner_id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub repo_url: Option<String>,
    pub live_url: Option<String>,
    pub tags: Vec<String>,
    pub cover_key: Option<String>,
    pub published: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub include_drafts: bool,
    pub tag: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Views,
    Likes,
}

impl Counter {
    pub fn column(self) -> &'static str {
        match self {
            Counter::Views => "views",
            Counter::Likes => "likes",
        }
    }
}
