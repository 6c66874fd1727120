use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Counter, NewProject, Project, ProjectFilter, ProjectRow, ProjectStats};
use crate::db::classify;

const PROJECT_COLUMNS: &str = "id, owner_id, title, slug, summary, body, repo_url, live_url, \
                               tags, cover_key, published, created_at, updated_at";

const JOINED_SELECT: &str = r#"
    SELECT p.id, p.owner_id, p.title, p.slug, p.summary, p.body, p.repo_url, p.live_url,
           p.tags, p.cover_key, p.published, p.created_at, p.updated_at,
           s.views, s.likes, s.updated_at AS stats_updated_at
      FROM projects p
      JOIN project_stats s ON s.project_id = p.id
"#;

#[async_trait]
pub trait ProjectRepo: Send + Sync {
    async fn list(&self, filter: &ProjectFilter) -> anyhow::Result<Vec<(Project, ProjectStats)>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<(Project, ProjectStats)>>;
    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<(Project, ProjectStats)>>;
    /// Inserts the project together with its zeroed stats row.
    async fn create(&self, project: NewProject) -> anyhow::Result<(Project, ProjectStats)>;
    async fn save(&self, project: &Project) -> anyhow::Result<Option<(Project, ProjectStats)>>;
    /// Returns the deleted row so callers can clean up its cover object.
    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Project>>;
    async fn bump(&self, id: Uuid, counter: Counter) -> anyhow::Result<Option<ProjectStats>>;
    /// Whether any project other than `except` has `key` as its cover.
    async fn cover_in_use(&self, key: &str, except: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgProjectRepo {
    db: PgPool,
}

impl PgProjectRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProjectRepo for PgProjectRepo {
    async fn list(&self, filter: &ProjectFilter) -> anyhow::Result<Vec<(Project, ProjectStats)>> {
        let sql = format!(
            r#"{JOINED_SELECT}
             WHERE ($1 OR p.published)
               AND ($2::text IS NULL OR $2 = ANY(p.tags))
             ORDER BY p.created_at DESC
             LIMIT $3 OFFSET $4"#
        );
        let rows = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(filter.include_drafts)
            .bind(filter.tag.as_deref())
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.db)
            .await
            .context("list projects")?;
        Ok(rows.into_iter().map(ProjectRow::into_parts).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<(Project, ProjectStats)>> {
        let sql = format!("{JOINED_SELECT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find project by id")?;
        Ok(row.map(ProjectRow::into_parts))
    }

    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<(Project, ProjectStats)>> {
        let sql = format!("{JOINED_SELECT} WHERE p.slug = $1");
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.db)
            .await
            .context("find project by slug")?;
        Ok(row.map(ProjectRow::into_parts))
    }

    async fn create(&self, p: NewProject) -> anyhow::Result<(Project, ProjectStats)> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let sql = format!(
            r#"
            INSERT INTO projects
                (owner_id, title, slug, summary, body, repo_url, live_url, tags, cover_key, published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PROJECT_COLUMNS}
            "#
        );
        let project = sqlx::query_as::<_, Project>(&sql)
            .bind(p.owner_id)
            .bind(&p.title)
            .bind(&p.slug)
            .bind(&p.summary)
            .bind(&p.body)
            .bind(&p.repo_url)
            .bind(&p.live_url)
            .bind(&p.tags)
            .bind(&p.cover_key)
            .bind(p.published)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, "slug", "owner does not exist"))?;

        let stats = sqlx::query_as::<_, ProjectStats>(
            r#"
            INSERT INTO project_stats (project_id)
            VALUES ($1)
            RETURNING project_id, views, likes, updated_at
            "#,
        )
        .bind(project.id)
        .fetch_one(&mut *tx)
        .await
        .context("insert project stats")?;

        tx.commit().await.context("commit tx")?;
        Ok((project, stats))
    }

    async fn save(&self, p: &Project) -> anyhow::Result<Option<(Project, ProjectStats)>> {
        let res = sqlx::query(
            r#"
            UPDATE projects
               SET title = $2, slug = $3, summary = $4, body = $5, repo_url = $6,
                   live_url = $7, tags = $8, cover_key = $9, published = $10,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(p.id)
        .bind(&p.title)
        .bind(&p.slug)
        .bind(&p.summary)
        .bind(&p.body)
        .bind(&p.repo_url)
        .bind(&p.live_url)
        .bind(&p.tags)
        .bind(&p.cover_key)
        .bind(p.published)
        .execute(&self.db)
        .await
        .map_err(|e| classify(e, "slug", "project"))?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(p.id).await
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Project>> {
        let sql = format!("DELETE FROM projects WHERE id = $1 RETURNING {PROJECT_COLUMNS}");
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("delete project")
    }

    async fn bump(&self, id: Uuid, counter: Counter) -> anyhow::Result<Option<ProjectStats>> {
        let column = counter.column();
        let sql = format!(
            r#"
            UPDATE project_stats
               SET {column} = {column} + 1, updated_at = now()
             WHERE project_id = $1
            RETURNING project_id, views, likes, updated_at
            "#
        );
        sqlx::query_as::<_, ProjectStats>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("increment {column}"))
    }

    async fn cover_in_use(&self, key: &str, except: Uuid) -> anyhow::Result<bool> {
        let (in_use,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM projects WHERE cover_key = $1 AND id <> $2)",
        )
        .bind(key)
        .bind(except)
        .fetch_one(&self.db)
        .await
        .context("check cover usage")?;
        Ok(in_use)
    }
}
