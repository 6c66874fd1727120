use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Comment, CommentView};
use crate::db::classify;

const VIEW_SELECT: &str = r#"
    SELECT c.id, c.project_id, c.author_id, u.name AS author_name, c.body,
           c.created_at, c.updated_at
      FROM comments c
      JOIN users u ON u.id = c.author_id
"#;

#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Oldest first.
    async fn list_for_project(
        &self,
        project_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<CommentView>>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Comment>>;
    async fn create(&self, project_id: Uuid, author_id: Uuid, body: &str) -> anyhow::Result<CommentView>;
    async fn update_body(&self, id: Uuid, body: &str) -> anyhow::Result<Option<CommentView>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgCommentRepo {
    db: PgPool,
}

impl PgCommentRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn view(&self, id: Uuid) -> anyhow::Result<Option<CommentView>> {
        let sql = format!("{VIEW_SELECT} WHERE c.id = $1");
        sqlx::query_as::<_, CommentView>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("load comment view")
    }
}

#[async_trait]
impl CommentRepo for PgCommentRepo {
    async fn list_for_project(
        &self,
        project_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<CommentView>> {
        let sql = format!(
            "{VIEW_SELECT} WHERE c.project_id = $1 ORDER BY c.created_at ASC, c.id ASC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, CommentView>(&sql)
            .bind(project_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list comments")
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, project_id, author_id, body, created_at, updated_at
              FROM comments
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find comment")
    }

    async fn create(&self, project_id: Uuid, author_id: Uuid, body: &str) -> anyhow::Result<CommentView> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO comments (project_id, author_id, body)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(project_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, "comment", "project or author no longer exists"))?;

        self.view(id)
            .await?
            .context("comment vanished right after insert")
    }

    async fn update_body(&self, id: Uuid, body: &str) -> anyhow::Result<Option<CommentView>> {
        let res = sqlx::query("UPDATE comments SET body = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(body)
            .execute(&self.db)
            .await
            .context("update comment")?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }
        self.view(id).await
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete comment")?;
        Ok(res.rows_affected() > 0)
    }
}
